//! The Category entity and its schema descriptor.
//!
//! [`CATEGORY_SCHEMA`] is the single description of the table that the query
//! translator, the metadata document and the DDL are all derived from.

use crate::executor::StorageError;
use crate::seed::CommerceCategory;
use fake::Dummy;
use may_postgres::Row;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A persisted category row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Storage-generated key, immutable after insert.
    pub id: i32,
    pub name: String,
}

/// A category staged for insert; `id` is assigned by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Dummy)]
pub struct NewCategory {
    #[dummy(faker = "CommerceCategory")]
    pub name: String,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Trait for building a model from a result row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self, StorageError>;
}

impl FromRow for Category {
    fn from_row(row: &Row) -> Result<Self, StorageError> {
        let id = row
            .try_get::<_, i32>("id")
            .map_err(|e| StorageError::ParseError(format!("Failed to read column id: {e}")))?;
        let name = row
            .try_get::<_, String>("name")
            .map_err(|e| StorageError::ParseError(format!("Failed to read column name: {e}")))?;
        Ok(Self { id, name })
    }
}

/// EDM primitive type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdmType {
    Int32,
    String,
}

impl EdmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdmType::Int32 => "Edm.Int32",
            EdmType::String => "Edm.String",
        }
    }
}

impl fmt::Display for EdmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural property of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDef {
    /// Name used in query options and JSON payloads.
    pub name: &'static str,
    /// Column name in the table.
    pub column: &'static str,
    pub edm_type: EdmType,
    pub nullable: bool,
}

/// Explicit description of an entity set and its backing table.
#[derive(Debug)]
pub struct EntitySchema {
    pub namespace: &'static str,
    pub entity_type: &'static str,
    pub entity_set: &'static str,
    pub table: &'static str,
    /// Key property; also the stable-ordering tiebreaker.
    pub key: &'static str,
    pub properties: &'static [PropertyDef],
    /// Navigation properties available to `$expand`.
    pub navigation: &'static [&'static str],
}

impl EntitySchema {
    /// Look a property up by name (case-sensitive, as in OData).
    pub fn property(&self, name: &str) -> Option<&'static PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn key_property(&self) -> &'static PropertyDef {
        self.property(self.key)
            .unwrap_or(&self.properties[0])
    }

    /// Table columns in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.properties.iter().map(|p| p.column)
    }
}

pub static CATEGORY_SCHEMA: EntitySchema = EntitySchema {
    namespace: "CategoryOData.Models",
    entity_type: "Category",
    entity_set: "Categories",
    table: "category",
    key: "id",
    properties: &[
        PropertyDef {
            name: "id",
            column: "id",
            edm_type: EdmType::Int32,
            nullable: false,
        },
        PropertyDef {
            name: "name",
            column: "name",
            edm_type: EdmType::String,
            nullable: false,
        },
    ],
    navigation: &[],
};

/// A primitive property value, borrowed from an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Int(i64),
    Str(&'a str),
    Null,
}

/// Property access by name, used for in-memory evaluation of query options.
pub trait EntityValues {
    fn value_of(&self, property: &str) -> FieldValue<'_>;
}

impl EntityValues for Category {
    fn value_of(&self, property: &str) -> FieldValue<'_> {
        match property {
            "id" => FieldValue::Int(i64::from(self.id)),
            "name" => FieldValue::Str(&self.name),
            _ => FieldValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::{Fake, Faker};

    #[test]
    fn test_schema_lookup() {
        let id = CATEGORY_SCHEMA.property("id").unwrap();
        assert_eq!(id.edm_type, EdmType::Int32);
        assert!(!id.nullable);
        assert!(CATEGORY_SCHEMA.property("Name").is_none());
        assert_eq!(CATEGORY_SCHEMA.key_property().name, "id");
        assert_eq!(CATEGORY_SCHEMA.columns().collect::<Vec<_>>(), vec!["id", "name"]);
        assert!(CATEGORY_SCHEMA.navigation.is_empty());
    }

    #[test]
    fn test_category_serializes_as_id_and_name() {
        let json = serde_json::to_value(Category { id: 3, name: "Toys".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"id": 3, "name": "Toys"}));
    }

    #[test]
    fn test_fake_new_category_has_commerce_name() {
        let category: NewCategory = Faker.fake();
        assert!(!category.name.is_empty());
    }

    #[test]
    fn test_value_of() {
        let c = Category { id: 9, name: "Garden".into() };
        assert_eq!(c.value_of("id"), FieldValue::Int(9));
        assert_eq!(c.value_of("name"), FieldValue::Str("Garden"));
        assert_eq!(c.value_of("missing"), FieldValue::Null);
    }
}

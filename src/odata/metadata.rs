//! Service and `$metadata` documents.
//!
//! Both are derived from the entity schema and capability set, so the
//! advertised model never drifts from what the translator accepts.

use super::capabilities::QueryCapabilities;
use crate::entity::EntitySchema;
use serde_json::{json, Map, Value};

/// OData service document: the entity sets under the service root.
pub fn service_document(schema: &EntitySchema, context_base: &str) -> Value {
    json!({
        "@odata.context": format!("{context_base}/$metadata"),
        "value": [{
            "name": schema.entity_set,
            "kind": "EntitySet",
            "url": schema.entity_set,
        }]
    })
}

/// CSDL JSON document for one entity set.
pub fn metadata_document(schema: &EntitySchema, capabilities: &QueryCapabilities) -> Value {
    let mut entity_type = Map::new();
    entity_type.insert("$Kind".into(), json!("EntityType"));
    entity_type.insert("$Key".into(), json!([schema.key]));
    for property in schema.properties {
        let mut definition = Map::new();
        definition.insert("$Type".into(), json!(property.edm_type.as_str()));
        // CSDL JSON omits $Nullable when true
        if !property.nullable {
            definition.insert("$Nullable".into(), json!(false));
        }
        entity_type.insert(property.name.into(), Value::Object(definition));
    }

    let qualified = format!("{}.{}", schema.namespace, schema.entity_type);
    let non_selectable: Vec<&str> = if capabilities.select {
        Vec::new()
    } else {
        schema.properties.iter().map(|p| p.name).collect()
    };

    let entity_set = json!({
        "$Collection": true,
        "$Type": qualified,
        "@Org.OData.Capabilities.V1.FilterRestrictions": { "Filterable": capabilities.filter },
        "@Org.OData.Capabilities.V1.SortRestrictions": { "Sortable": capabilities.order_by },
        "@Org.OData.Capabilities.V1.CountRestrictions": { "Countable": capabilities.count },
        "@Org.OData.Capabilities.V1.ExpandRestrictions": { "Expandable": capabilities.expand },
        "@Org.OData.Capabilities.V1.TopSupported": capabilities.top,
        "@Org.OData.Capabilities.V1.SkipSupported": capabilities.skip,
        "@Org.OData.Capabilities.V1.SelectSupport": {
            "Supported": capabilities.select,
            "NonSelectableProperties": non_selectable,
        },
        "@Org.OData.Capabilities.V1.TopRestrictions": { "MaxTop": capabilities.max_top },
    });

    let mut container = Map::new();
    container.insert("$Kind".into(), json!("EntityContainer"));
    container.insert(schema.entity_set.into(), entity_set);

    let mut namespace = Map::new();
    namespace.insert(schema.entity_type.into(), Value::Object(entity_type));
    namespace.insert("Container".into(), Value::Object(container));

    let mut document = Map::new();
    document.insert("$Version".into(), json!("4.01"));
    document.insert(
        "$EntityContainer".into(),
        json!(format!("{}.Container", schema.namespace)),
    );
    document.insert(schema.namespace.into(), Value::Object(namespace));
    Value::Object(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::CATEGORY_SCHEMA;
    use crate::odata::capabilities::CATEGORY_CAPABILITIES;

    #[test]
    fn test_metadata_describes_category() {
        let doc = metadata_document(&CATEGORY_SCHEMA, &CATEGORY_CAPABILITIES);
        let ns = &doc["CategoryOData.Models"];
        assert_eq!(doc["$EntityContainer"], "CategoryOData.Models.Container");
        assert_eq!(ns["Category"]["$Key"], json!(["id"]));
        assert_eq!(ns["Category"]["id"]["$Type"], "Edm.Int32");
        assert_eq!(ns["Category"]["name"]["$Nullable"], false);

        let set = &ns["Container"]["Categories"];
        assert_eq!(set["$Type"], "CategoryOData.Models.Category");
        assert_eq!(set["@Org.OData.Capabilities.V1.SelectSupport"]["Supported"], false);
        assert_eq!(set["@Org.OData.Capabilities.V1.TopRestrictions"]["MaxTop"], Value::Null);
    }

    #[test]
    fn test_service_document_lists_entity_set() {
        let doc = service_document(&CATEGORY_SCHEMA, "http://localhost:8080/odata");
        assert_eq!(doc["@odata.context"], "http://localhost:8080/odata/$metadata");
        assert_eq!(doc["value"][0]["name"], "Categories");
    }
}

//! Table bootstrap run once at startup.

use crate::entity::CATEGORY_SCHEMA;
use crate::executor::{SqlExecutor, StorageError};
use sea_query::{ColumnDef, PostgresQueryBuilder, Table, TableCreateStatement};

/// `CREATE TABLE IF NOT EXISTS category (id SERIAL PRIMARY KEY, name TEXT NOT NULL)`
pub fn create_category_table() -> TableCreateStatement {
    Table::create()
        .table(CATEGORY_SCHEMA.table)
        .if_not_exists()
        .col(
            ColumnDef::new("id")
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new("name").text().not_null())
        .to_owned()
}

/// Create the category table when it does not exist yet.
///
/// Safe to call on every start; an existing table is left untouched.
pub fn ensure_schema(executor: &impl SqlExecutor) -> Result<(), StorageError> {
    let sql = create_category_table().build(PostgresQueryBuilder);
    executor.execute(&sql, &[])?;
    log::info!("Ensured table \"{}\" exists", CATEGORY_SCHEMA.table);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_sql() {
        let sql = create_category_table().build(PostgresQueryBuilder);
        assert!(sql.starts_with(r#"CREATE TABLE IF NOT EXISTS "category""#));
        assert!(sql.contains(r#""id" serial NOT NULL PRIMARY KEY"#));
        assert!(sql.contains(r#""name" text NOT NULL"#));
    }
}

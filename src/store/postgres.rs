//! PostgreSQL-backed Category store.

use super::{CategoryStore, QueryPage};
use crate::entity::{Category, FromRow, NewCategory, CATEGORY_SCHEMA};
use crate::executor::{PgExecutor, SqlExecutor, StorageError};
use crate::odata::ComposedQuery;
use crate::pool::DbPool;
use crate::value_conversion::with_converted_params;
use sea_query::{Expr, InsertStatement, PostgresQueryBuilder, Query, SelectStatement};

/// Rows per INSERT statement; keeps bind parameters well under PostgreSQL's limit.
const INSERT_CHUNK: usize = 1000;

/// Store that checks a connection out of [`DbPool`] for each operation.
#[derive(Clone)]
pub struct PgCategoryStore {
    pool: DbPool,
}

impl PgCategoryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Run a SELECT and parse every row.
pub fn select_all<M: FromRow>(
    executor: &impl SqlExecutor,
    statement: &SelectStatement,
) -> Result<Vec<M>, StorageError> {
    let (sql, values) = statement.build(PostgresQueryBuilder);
    with_converted_params(&values, |params| {
        executor
            .query_all(&sql, params)?
            .iter()
            .map(M::from_row)
            .collect()
    })
}

/// Run a `SELECT COUNT(*)`.
pub fn select_count(executor: &impl SqlExecutor, statement: &SelectStatement) -> Result<u64, StorageError> {
    let (sql, values) = statement.build(PostgresQueryBuilder);
    with_converted_params(&values, |params| {
        let row = executor.query_one(&sql, params)?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| StorageError::ParseError(format!("Failed to read count: {e}")))?;
        u64::try_from(count).map_err(|_| StorageError::ParseError(format!("Count cannot be negative: {count}")))
    })
}

/// `INSERT INTO category (name) VALUES ... RETURNING id, name`
pub fn insert_statement(records: &[NewCategory]) -> Result<InsertStatement, StorageError> {
    let mut insert = Query::insert();
    insert.into_table(CATEGORY_SCHEMA.table).columns(["name"]);
    for record in records {
        insert
            .values([Expr::val(record.name.clone())])
            .map_err(|e| StorageError::QueryError(format!("Failed to build insert: {e}")))?;
    }
    insert.returning(Query::returning().columns(CATEGORY_SCHEMA.columns()));
    Ok(insert.to_owned())
}

fn insert_chunks(executor: &impl SqlExecutor, records: &[NewCategory]) -> Result<Vec<Category>, StorageError> {
    let mut inserted = Vec::with_capacity(records.len());
    for chunk in records.chunks(INSERT_CHUNK) {
        let (sql, values) = insert_statement(chunk)?.build(PostgresQueryBuilder);
        let rows = with_converted_params(&values, |params| executor.query_all(&sql, params))?;
        for row in &rows {
            inserted.push(Category::from_row(row)?);
        }
    }
    Ok(inserted)
}

impl CategoryStore for PgCategoryStore {
    fn fetch(&self, query: &ComposedQuery) -> Result<QueryPage<Category>, StorageError> {
        let connection = self.pool.acquire()?;
        let executor: &PgExecutor = &connection;

        let count = if query.count {
            Some(select_count(executor, &query.count_statement())?)
        } else {
            None
        };
        let items = select_all(executor, &query.select_statement())?;

        Ok(QueryPage { items, count })
    }

    fn count(&self, query: &ComposedQuery) -> Result<u64, StorageError> {
        let connection = self.pool.acquire()?;
        select_count(&*connection, &query.count_statement())
    }

    fn insert_all(&self, records: &[NewCategory]) -> Result<Vec<Category>, StorageError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let connection = self.pool.acquire()?;
        let transaction = connection.begin()?;

        let inserted = match insert_chunks(&transaction, records) {
            Ok(inserted) => inserted,
            Err(e) => {
                if let Err(rollback) = transaction.rollback() {
                    log::warn!("Rollback after failed insert also failed: {rollback}");
                }
                return Err(e);
            }
        };
        transaction.commit()?;
        log::debug!("Committed {} new categories", inserted.len());
        Ok(inserted)
    }
}

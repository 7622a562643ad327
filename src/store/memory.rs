//! In-memory Category store.
//!
//! Evaluates a [`ComposedQuery`] directly over a vector. String ordering is
//! byte-wise rather than collation-aware, which is close enough for tests.

use super::{CategoryStore, QueryPage};
use crate::entity::{Category, EntityValues, FieldValue, NewCategory};
use crate::executor::StorageError;
use crate::odata::filter::{CompareOp, Direction, FilterExpr, Literal, StringFunction};
use crate::odata::ComposedQuery;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Mutex;

#[derive(Default)]
struct Table {
    rows: Vec<Category>,
    next_id: i32,
}

/// Thread-safe, process-local store.
#[derive(Default)]
pub struct MemoryStore {
    table: Mutex<Table>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `names`, ids assigned from 1.
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Table::default();
        for name in names {
            table.push(name.into());
        }
        Self {
            table: Mutex::new(table),
            ..Self::default()
        }
    }

    /// Make every subsequent query fail, to exercise error paths.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, AtomicOrdering::SeqCst);
    }

    /// Make every subsequent insert fail, to exercise error paths.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().map(|t| t.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Table>, StorageError> {
        self.table
            .lock()
            .map_err(|_| StorageError::Unavailable("in-memory table lock poisoned".to_string()))
    }

    /// Lock the table for reading, honouring [`fail_reads`](Self::fail_reads).
    fn read(&self) -> Result<std::sync::MutexGuard<'_, Table>, StorageError> {
        if self.fail_reads.load(AtomicOrdering::SeqCst) {
            return Err(StorageError::QueryError("reads disabled".to_string()));
        }
        self.lock()
    }
}

impl Table {
    fn push(&mut self, name: String) -> Category {
        self.next_id += 1;
        let row = Category { id: self.next_id, name };
        self.rows.push(row.clone());
        row
    }

    fn matching<'a>(&'a self, query: &'a ComposedQuery) -> impl Iterator<Item = &'a Category> + 'a {
        self.rows
            .iter()
            .filter(move |row| query.filter.as_ref().map_or(true, |f| matches(f, *row)))
    }
}

fn compare_field(field: FieldValue<'_>, value: &Literal) -> Option<Ordering> {
    match (field, value) {
        (FieldValue::Int(a), Literal::Int(b)) => Some(a.cmp(b)),
        (FieldValue::Str(a), Literal::Str(b)) => Some(a.cmp(&b.as_str())),
        _ => None,
    }
}

/// SQL three-valued logic collapsed to `bool`: unknown is false.
pub fn matches(expr: &FilterExpr, entity: &impl EntityValues) -> bool {
    match expr {
        FilterExpr::Compare { property, op, value } => {
            let Some(ordering) = compare_field(entity.value_of(property.name), value) else {
                return false;
            };
            match op {
                CompareOp::Eq => ordering == Ordering::Equal,
                CompareOp::Ne => ordering != Ordering::Equal,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Ge => ordering != Ordering::Less,
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
            }
        }
        FilterExpr::IsNull { property, negated } => {
            let is_null = entity.value_of(property.name) == FieldValue::Null;
            is_null != *negated
        }
        FilterExpr::Function {
            function,
            property,
            argument,
        } => match entity.value_of(property.name) {
            FieldValue::Str(s) => match function {
                StringFunction::Contains => s.contains(argument.as_str()),
                StringFunction::StartsWith => s.starts_with(argument.as_str()),
                StringFunction::EndsWith => s.ends_with(argument.as_str()),
            },
            _ => false,
        },
        FilterExpr::Not(inner) => !matches(inner, entity),
        FilterExpr::And(left, right) => matches(left, entity) && matches(right, entity),
        FilterExpr::Or(left, right) => matches(left, entity) || matches(right, entity),
    }
}

fn compare_values(a: FieldValue<'_>, b: FieldValue<'_>) -> Ordering {
    match (a, b) {
        (FieldValue::Int(x), FieldValue::Int(y)) => x.cmp(&y),
        (FieldValue::Str(x), FieldValue::Str(y)) => x.cmp(&y),
        // PostgreSQL sorts NULLs last in ascending order
        (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
        (FieldValue::Null, _) => Ordering::Greater,
        (_, FieldValue::Null) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

impl CategoryStore for MemoryStore {
    fn fetch(&self, query: &ComposedQuery) -> Result<QueryPage<Category>, StorageError> {
        let table = self.read()?;
        let mut rows: Vec<Category> = table.matching(query).cloned().collect();

        let count = query.count.then_some(rows.len() as u64);

        let key = query.schema.key;
        rows.sort_by(|a, b| {
            for item in &query.order_by {
                let ordering = compare_values(a.value_of(item.property.name), b.value_of(item.property.name));
                let ordering = match item.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            compare_values(a.value_of(key), b.value_of(key))
        });

        let skip = usize::try_from(query.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let top = query
            .top
            .map(|t| usize::try_from(t).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        let items = rows.into_iter().skip(skip).take(top).collect();

        Ok(QueryPage { items, count })
    }

    fn count(&self, query: &ComposedQuery) -> Result<u64, StorageError> {
        Ok(self.read()?.matching(query).count() as u64)
    }

    fn insert_all(&self, records: &[NewCategory]) -> Result<Vec<Category>, StorageError> {
        if self.fail_writes.load(AtomicOrdering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        let mut table = self.lock()?;
        Ok(records.iter().map(|record| table.push(record.name.clone())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::CATEGORY_SCHEMA;
    use crate::odata::{translate, QueryOptions, CATEGORY_CAPABILITIES};

    fn run(store: &MemoryStore, query: &str) -> QueryPage<Category> {
        let options = QueryOptions::parse(query).unwrap();
        let composed = translate(&options, &CATEGORY_CAPABILITIES, &CATEGORY_SCHEMA).unwrap();
        store.fetch(&composed).unwrap()
    }

    fn names(page: &QueryPage<Category>) -> Vec<&str> {
        page.items.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_filter_returns_exactly_matching_rows() {
        let store = MemoryStore::with_names(["Books", "Games", "Toys", "Garden", "Baby"]);
        let page = run(&store, "$filter=contains(name,'a')");
        assert_eq!(names(&page), vec!["Games", "Garden", "Baby"]);
    }

    #[test]
    fn test_order_top_skip_count() {
        let store = MemoryStore::with_names(["Books", "Games", "Toys", "Garden", "Baby"]);
        let page = run(&store, "$orderby=name desc&$top=2&$skip=1&$count=true");
        assert_eq!(names(&page), vec!["Games", "Garden"]);
        assert_eq!(page.count, Some(5));
    }

    #[test]
    fn test_logical_operators() {
        let store = MemoryStore::with_names(["Books", "Games", "Toys", "Garden", "Baby"]);
        let page = run(&store, "$filter=startswith(name,'G') and not endswith(name,'s') or id eq 1");
        assert_eq!(names(&page), vec!["Books", "Garden"]);
    }

    #[test]
    fn test_null_checks_on_non_null_column() {
        let store = MemoryStore::with_names(["Books"]);
        assert!(run(&store, "$filter=name eq null").items.is_empty());
        assert_eq!(run(&store, "$filter=name ne null").items.len(), 1);
    }

    #[test]
    fn test_count_ignores_paging() {
        let store = MemoryStore::with_names(["Books", "Games", "Toys", "Garden", "Baby"]);
        let options = QueryOptions::parse("$filter=startswith(name,'G')&$top=1&$skip=1").unwrap();
        let composed = translate(&options, &CATEGORY_CAPABILITIES, &CATEGORY_SCHEMA).unwrap();
        assert_eq!(store.count(&composed).unwrap(), 2);
    }

    #[test]
    fn test_failed_read_reports_query_error() {
        let store = MemoryStore::with_names(["Books"]);
        store.fail_reads(true);
        let composed = ComposedQuery::unfiltered(&CATEGORY_SCHEMA);
        assert!(matches!(store.fetch(&composed), Err(StorageError::QueryError(_))));
        assert!(store.count(&composed).is_err());

        store.fail_reads(false);
        assert_eq!(store.fetch(&composed).unwrap().items.len(), 1);
    }

    #[test]
    fn test_failed_write_leaves_table_untouched() {
        let store = MemoryStore::with_names(["Books"]);
        store.fail_writes(true);
        assert!(store.insert_all(&[NewCategory::new("Toys")]).is_err());
        assert_eq!(store.len(), 1);
    }
}

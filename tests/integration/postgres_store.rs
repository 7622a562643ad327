//! Integration tests for the PostgreSQL category store.
//!
//! These tests require a running PostgreSQL database. Set TEST_DATABASE_URL;
//! without it every test returns early. They share the `category` table, so
//! each one takes a process-wide lock and only asserts on relative counts or
//! rows it inserted itself.

use category_odata::api::CategoryService;
use category_odata::context::CategoryContext;
use category_odata::odata::{translate, QueryOptions, CATEGORY_CAPABILITIES};
use category_odata::schema::ensure_schema;
use category_odata::seed::{seed_categories, DEFAULT_SEED_COUNT};
use category_odata::store::QueryPage;
use category_odata::{
    Category, CategoryStore, DbPool, NewCategory, PgCategoryStore, SqlExecutor, CATEGORY_SCHEMA,
};
use once_cell::sync::Lazy;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

static TABLE_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn database_url() -> Option<String> {
    let url = std::env::var("TEST_DATABASE_URL").ok();
    if url.is_none() {
        eprintln!("TEST_DATABASE_URL not set; skipping");
    }
    url
}

fn setup() -> Option<(MutexGuard<'static, ()>, PgCategoryStore)> {
    let url = database_url()?;
    let guard = TABLE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let pool = DbPool::connect(&url, 2, Duration::from_secs(5)).expect("connect to test database");
    ensure_schema(&*pool.acquire().unwrap()).expect("create category table");
    Some((guard, PgCategoryStore::new(pool)))
}

fn row_count(store: &PgCategoryStore) -> i64 {
    let connection = store.pool().acquire().unwrap();
    connection
        .query_one("SELECT COUNT(*) FROM category", &[])
        .unwrap()
        .get::<_, i64>(0)
}

fn fetch(store: &PgCategoryStore, query: &str) -> QueryPage<Category> {
    let options = QueryOptions::parse(query).unwrap();
    let composed = translate(&options, &CATEGORY_CAPABILITIES, &CATEGORY_SCHEMA).unwrap();
    store.fetch(&composed).unwrap()
}

#[test]
fn test_seed_adds_exactly_one_hundred_rows() {
    let Some((_guard, store)) = setup() else { return };
    let before = row_count(&store);

    let mut context = CategoryContext::new(&store);
    let inserted = seed_categories(&mut context, DEFAULT_SEED_COUNT).unwrap();
    assert_eq!(inserted.len(), 100);
    assert_eq!(row_count(&store), before + 100);

    let mut context = CategoryContext::new(&store);
    seed_categories(&mut context, DEFAULT_SEED_COUNT).unwrap();
    assert_eq!(row_count(&store), before + 200);
}

#[test]
fn test_seeded_rows_round_trip() {
    let Some((_guard, store)) = setup() else { return };
    let mut context = CategoryContext::new(&store);
    let inserted = seed_categories(&mut context, 10).unwrap();

    for category in &inserted {
        let page = fetch(&store, &format!("$filter=id eq {}", category.id));
        assert_eq!(page.items, vec![category.clone()]);
    }
}

#[test]
fn test_filter_top_and_count_against_postgres() {
    let Some((_guard, store)) = setup() else { return };
    let marker = format!("it-{}", std::process::id());
    let mut context = CategoryContext::new(&store);
    context.add_range(
        ["a-One", "b-Two", "c-Three", "d-Four", "e-Five", "f-Six"]
            .iter()
            .map(|n| NewCategory::new(format!("{marker}-{n}"))),
    );
    context.save_changes().unwrap();

    let page = fetch(
        &store,
        &format!("$filter=startswith(name,'{marker}') and contains(name,'T')&$orderby=name desc&$count=true"),
    );
    let names: Vec<String> = page.items.iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, vec![format!("{marker}-c-Three"), format!("{marker}-b-Two")]);
    assert_eq!(page.count, Some(2));

    let page = fetch(&store, &format!("$filter=startswith(name,'{marker}')&$top=5&$skip=0"));
    assert_eq!(page.items.len(), 5);
}

#[test]
fn test_like_wildcards_are_literal() {
    let Some((_guard, store)) = setup() else { return };
    let mut context = CategoryContext::new(&store);
    context.add(NewCategory::new("100%_cotton"));
    context.add(NewCategory::new("100 wool"));
    context.save_changes().unwrap();

    let page = fetch(&store, "$filter=contains(name,'0%_c')");
    assert!(page.items.iter().all(|c| c.name.contains("0%_c")));
    assert!(!page.items.is_empty());
}

#[test]
fn test_service_seed_endpoint_against_postgres() {
    let Some((_guard, store)) = setup() else { return };
    let before = row_count(&store);
    let service = CategoryService::new(store, DEFAULT_SEED_COUNT);

    let (_, response) = service.handle("GET", "/seed-data/categories", None);
    assert_eq!(response.status, 204);
    assert!(response.body.is_empty());
    assert_eq!(row_count(service.store()), before + 100);
}

#[test]
fn test_failed_chunk_rolls_back_earlier_chunks() {
    let Some((_guard, store)) = setup() else { return };
    let before = row_count(&store);

    // the first 1000 rows go out in their own INSERT; NUL is rejected by text columns
    let mut records: Vec<NewCategory> = (0..1000).map(|i| NewCategory::new(format!("chunk-{i}"))).collect();
    records.push(NewCategory::new("bad\0name"));

    assert!(store.insert_all(&records).is_err());
    assert_eq!(row_count(&store), before);

    // the connection that saw the failure is still usable
    let inserted = store.insert_all(&[NewCategory::new("after-rollback")]).unwrap();
    assert_eq!(inserted.len(), 1);
    assert_eq!(row_count(&store), before + 1);
}

#[test]
fn test_pool_replaces_terminated_connection() {
    let Some(url) = database_url() else { return };
    let pool = DbPool::connect(&url, 1, Duration::from_secs(5)).expect("connect to test database");

    {
        let connection = pool.acquire().unwrap();
        assert!(connection.check_health());
        // the backend kills itself, so this statement fails with a closed connection
        assert!(connection.execute("SELECT pg_terminate_backend(pg_backend_pid())", &[]).is_err());
        assert!(connection.is_suspect());
    }

    let connection = pool.acquire().expect("broken connection is replaced on checkout");
    assert!(!connection.is_suspect());
    let one: i32 = connection.query_one("SELECT 1", &[]).unwrap().get(0);
    assert_eq!(one, 1);
    drop(connection);
    assert_eq!(pool.idle(), pool.size());
}

#[test]
fn test_count_segment_against_postgres() {
    let Some((_guard, store)) = setup() else { return };
    let marker = format!("cnt-{}", std::process::id());
    let mut context = CategoryContext::new(&store);
    context.add_range((0..3).map(|i| NewCategory::new(format!("{marker}-{i}"))));
    context.save_changes().unwrap();

    let service = CategoryService::new(store, DEFAULT_SEED_COUNT);
    let (_, response) = service.handle(
        "GET",
        &format!("/odata/Categories/$count?$filter=startswith(name,'{marker}')"),
        None,
    );
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"3");
}

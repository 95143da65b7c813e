//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency and need a
//! running Docker daemon. Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use order_store::{
    DocumentQuery, DocumentStore, DocumentStoreExt, OrderDocument, OrderId, PostgresDocumentStore,
    StoreError, Version,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            PostgresDocumentStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and a cleared table
async fn get_test_store() -> PostgresDocumentStore {
    let info = get_container_info().await;

    // Create a fresh pool for each test to avoid connection issues
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE orders")
        .execute(&pool)
        .await
        .unwrap();

    PostgresDocumentStore::new(pool)
}

fn create_test_document(owner: &str, status: &str) -> OrderDocument {
    OrderDocument::builder()
        .id(OrderId::new())
        .owner_id(owner)
        .status(status)
        .body(serde_json::json!({"test": true}))
        .try_build()
        .unwrap()
}

fn bumped(document: &OrderDocument, status: &str) -> OrderDocument {
    OrderDocument {
        status: status.to_string(),
        version: document.version.next(),
        updated_at: Utc::now(),
        body: serde_json::json!({"status": status}),
        ..document.clone()
    }
}

#[tokio::test]
#[serial]
async fn insert_and_get_document() {
    let store = get_test_store().await;
    let document = create_test_document("user-1", "Created");
    let id = document.id;

    store.insert(document.clone()).await.unwrap();

    let stored = store.get_existing(id).await.unwrap();
    assert_eq!(stored.owner_id.as_str(), "user-1");
    assert_eq!(stored.status, "Created");
    assert_eq!(stored.version, Version::first());
    assert_eq!(stored.body, document.body);
}

#[tokio::test]
#[serial]
async fn insert_duplicate_id_is_already_exists() {
    let store = get_test_store().await;
    let document = create_test_document("user-1", "Created");

    store.insert(document.clone()).await.unwrap();
    let result = store.insert(document).await;

    assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
}

#[tokio::test]
#[serial]
async fn compare_and_swap_success() {
    let store = get_test_store().await;
    let document = create_test_document("user-1", "Created");
    let id = document.id;
    store.insert(document.clone()).await.unwrap();

    store
        .compare_and_swap(bumped(&document, "Paid"), Version::first())
        .await
        .unwrap();

    let stored = store.get_existing(id).await.unwrap();
    assert_eq!(stored.status, "Paid");
    assert_eq!(stored.version, Version::new(2));
    assert_eq!(stored.body, serde_json::json!({"status": "Paid"}));
}

#[tokio::test]
#[serial]
async fn compare_and_swap_conflict() {
    let store = get_test_store().await;
    let document = create_test_document("user-1", "Created");
    let id = document.id;
    store.insert(document.clone()).await.unwrap();

    store
        .compare_and_swap(bumped(&document, "Paid"), Version::first())
        .await
        .unwrap();

    let result = store
        .compare_and_swap(bumped(&document, "Cancelled"), Version::first())
        .await;

    assert!(matches!(
        result,
        Err(StoreError::VersionConflict { actual, .. }) if actual == Version::new(2)
    ));

    let stored = store.get_existing(id).await.unwrap();
    assert_eq!(stored.status, "Paid");
}

#[tokio::test]
#[serial]
async fn compare_and_swap_missing_is_not_found() {
    let store = get_test_store().await;
    let document = create_test_document("user-1", "Created");

    let result = store
        .compare_and_swap(bumped(&document, "Paid"), Version::first())
        .await;

    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
#[serial]
async fn concurrent_compare_and_swap_single_winner() {
    let store = get_test_store().await;
    let document = create_test_document("user-1", "Created");
    let id = document.id;
    store.insert(document.clone()).await.unwrap();

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let store = store.clone();
            let replacement = bumped(&document, "Paid");
            tokio::spawn(async move { store.compare_and_swap(replacement, Version::first()).await })
        })
        .collect();

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => successes += 1,
            Err(StoreError::VersionConflict { .. }) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 4);
    assert_eq!(
        store.current_version(id).await.unwrap(),
        Some(Version::new(2))
    );
}

#[tokio::test]
#[serial]
async fn delete_document() {
    let store = get_test_store().await;
    let document = create_test_document("user-1", "Created");
    let id = document.id;
    store.insert(document).await.unwrap();

    assert!(store.delete(id).await.unwrap());
    assert!(!store.delete(id).await.unwrap());
    assert!(store.get(id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn query_filters_and_pages() {
    let store = get_test_store().await;
    let base = Utc::now();

    let mut ids = Vec::new();
    for i in 0..4 {
        let mut document = create_test_document("user-1", "Created");
        document.created_at = base + Duration::seconds(i);
        document.updated_at = document.created_at;
        ids.push(document.id);
        store.insert(document).await.unwrap();
    }
    store
        .insert(create_test_document("user-2", "Paid"))
        .await
        .unwrap();

    let page = store
        .query(DocumentQuery::for_owner("user-1").limit(2).offset(2))
        .await
        .unwrap();
    let page_ids: Vec<_> = page.iter().map(|d| d.id).collect();
    assert_eq!(page_ids, vec![ids[2], ids[3]]);

    let paid = store
        .query(DocumentQuery::for_status("Paid"))
        .await
        .unwrap();
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0].owner_id.as_str(), "user-2");
}

#[tokio::test]
#[serial]
async fn count_by_status() {
    let store = get_test_store().await;
    for status in ["Created", "Created", "Paid"] {
        store
            .insert(create_test_document("user-1", status))
            .await
            .unwrap();
    }

    assert_eq!(
        store
            .count(DocumentQuery::for_status("Created"))
            .await
            .unwrap(),
        2
    );
    assert_eq!(store.count(DocumentQuery::new()).await.unwrap(), 3);
}

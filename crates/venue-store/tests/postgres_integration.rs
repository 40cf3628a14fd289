//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p venue-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use venue_store::{
    PostgresVenueStore, VenueName, VenueStatus, VenueStore, VenueStoreError, VenueTransaction,
};

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

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_venues_table.sql"
            ))
            .execute(&temp_pool)
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

/// Get a fresh store with its own pool and an empty venues table
async fn get_test_store() -> PostgresVenueStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE venues RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    PostgresVenueStore::new(pool)
}

fn name(s: &str) -> VenueName {
    VenueName::parse(s).unwrap()
}

#[tokio::test]
#[serial]
async fn insert_then_find_by_name() {
    let store = get_test_store().await;
    let jakarta = name("Jakarta");

    let mut tx = store.begin().await.unwrap();
    assert!(tx.find_for_update(&jakarta).await.unwrap().is_none());
    let inserted = tx
        .insert(&jakarta, VenueStatus::new(true, false))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let found = store.find_by_name(&jakarta).await.unwrap().unwrap();
    assert_eq!(found.id, inserted.id);
    assert!(found.sold_out);
    assert!(!found.first_sold_out);
    assert!(found.updated_at.is_none());
}

#[tokio::test]
#[serial]
async fn names_are_case_sensitive() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    tx.insert(&name("Jakarta"), VenueStatus::default())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert!(store.find_by_name(&name("jakarta")).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn update_in_place_sets_updated_at() {
    let store = get_test_store().await;
    let jakarta = name("Jakarta");

    let mut tx = store.begin().await.unwrap();
    tx.insert(&jakarta, VenueStatus::default()).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let existing = tx.find_for_update(&jakarta).await.unwrap().unwrap();
    let updated = tx
        .update(&existing, VenueStatus::new(true, true))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(updated.id, existing.id);
    assert!(updated.updated_at.is_some());
    assert_eq!(store.find_all().await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn dropped_transaction_rolls_back() {
    let store = get_test_store().await;
    let jakarta = name("Jakarta");

    {
        let mut tx = store.begin().await.unwrap();
        tx.insert(&jakarta, VenueStatus::new(true, true))
            .await
            .unwrap();
    }

    assert!(store.find_by_name(&jakarta).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn single_holder_index_rejects_second_marker() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    tx.insert(&name("Jakarta"), VenueStatus::new(true, true))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let result = tx
        .insert(&name("Bandung"), VenueStatus::new(true, true))
        .await;
    assert!(matches!(
        result,
        Err(VenueStoreError::FirstSoldOutConflict { .. })
    ));
}

#[tokio::test]
#[serial]
async fn holder_lookup_excludes_self_and_soft_deleted() {
    let store = get_test_store().await;
    let jakarta = name("Jakarta");

    let mut tx = store.begin().await.unwrap();
    tx.insert(&jakarta, VenueStatus::new(true, true))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.lock_first_sold_out().await.unwrap();
    assert_eq!(tx.first_sold_out_holder(&jakarta).await.unwrap(), None);
    assert_eq!(
        tx.first_sold_out_holder(&name("Bandung")).await.unwrap(),
        Some(jakarta.clone())
    );
    drop(tx);

    sqlx::query("UPDATE venues SET deleted_at = NOW() WHERE name = 'Jakarta'")
        .execute(store.pool())
        .await
        .unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(
        tx.first_sold_out_holder(&name("Bandung")).await.unwrap(),
        None
    );
    assert!(store.find_by_name(&jakarta).await.unwrap().is_none());
    assert!(store.find_all().await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn release_transfers_marker() {
    let store = get_test_store().await;
    let jakarta = name("Jakarta");
    let bandung = name("Bandung");

    let mut tx = store.begin().await.unwrap();
    tx.insert(&jakarta, VenueStatus::new(true, true))
        .await
        .unwrap();
    tx.insert(&bandung, VenueStatus::default()).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.lock_first_sold_out().await.unwrap();
    let existing = tx.find_for_update(&bandung).await.unwrap().unwrap();
    assert_eq!(tx.release_first_sold_out(&bandung).await.unwrap(), 1);
    tx.update(&existing, VenueStatus::new(true, true))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let holders: Vec<_> = store
        .find_all()
        .await
        .unwrap()
        .into_iter()
        .filter(|v| v.first_sold_out)
        .collect();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].name, bandung);
}

#[tokio::test]
#[serial]
async fn advisory_lock_serializes_holder_claims() {
    let store = get_test_store().await;
    let venues: Vec<_> = (0..8).map(|i| name(&format!("Venue-{i}"))).collect();

    let mut handles = Vec::new();
    for venue in venues {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut tx = store.begin().await?;
            tx.lock_first_sold_out().await?;
            let claim = tx.first_sold_out_holder(&venue).await?.is_none();
            tx.insert(&venue, VenueStatus::new(true, claim)).await?;
            tx.commit().await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let holders = store
        .find_all()
        .await
        .unwrap()
        .into_iter()
        .filter(|v| v.first_sold_out)
        .count();
    assert_eq!(holders, 1);
}

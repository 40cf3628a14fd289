//! Reconciler tests against PostgreSQL.
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p domain --test reconciler_postgres -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use domain::{ReconcilerConfig, VenueStatusReconciler};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use venue_store::{PostgresVenueStore, VenueName, VenueStore};

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

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

type PgReconciler = VenueStatusReconciler<PostgresVenueStore>;

/// Reconciler over a fresh pool and an empty venues table
async fn create_reconciler() -> Arc<PgReconciler> {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(24)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE venues RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    Arc::new(VenueStatusReconciler::with_config(
        PostgresVenueStore::new(pool),
        ReconcilerConfig {
            tx_timeout: Duration::from_secs(30),
        },
    ))
}

async fn holders(reconciler: &PgReconciler) -> Vec<String> {
    reconciler
        .store()
        .find_all()
        .await
        .unwrap()
        .into_iter()
        .filter(|v| v.first_sold_out)
        .map(|v| v.name.to_string())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_signals_leave_a_single_holder() {
    let reconciler = create_reconciler().await;

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let reconciler = Arc::clone(&reconciler);
            tokio::spawn(async move {
                reconciler
                    .apply_sold_out_signal(&format!("venue-{i}"), true)
                    .await
            })
        })
        .collect();

    let mut claimed = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().first_sold_out {
            claimed += 1;
        }
    }

    assert_eq!(claimed, 1);
    assert_eq!(reconciler.store().find_all().await.unwrap().len(), 20);
    assert_eq!(holders(&reconciler).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_signals_for_one_venue_are_idempotent() {
    let reconciler = create_reconciler().await;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let reconciler = Arc::clone(&reconciler);
            tokio::spawn(async move { reconciler.apply_sold_out_signal("Jakarta", true).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().unwrap().first_sold_out);
    }

    assert_eq!(reconciler.store().find_all().await.unwrap().len(), 1);
    assert_eq!(holders(&reconciler).await, ["Jakarta"]);
}

#[tokio::test]
#[serial]
async fn explicit_status_transfers_marker() {
    let reconciler = create_reconciler().await;

    let jakarta = reconciler
        .apply_sold_out_signal("Jakarta", true)
        .await
        .unwrap();
    assert!(jakarta.first_sold_out);

    let bandung = reconciler
        .apply_explicit_status("Bandung", true, true)
        .await
        .unwrap();
    assert!(bandung.first_sold_out);
    assert_eq!(holders(&reconciler).await, ["Bandung"]);

    let name = VenueName::parse("Jakarta").unwrap();
    let jakarta = reconciler.store().find_by_name(&name).await.unwrap().unwrap();
    assert!(jakarta.sold_out);
    assert!(!jakarta.first_sold_out);

    let surabaya = reconciler
        .apply_sold_out_signal("Surabaya", true)
        .await
        .unwrap();
    assert!(!surabaya.first_sold_out);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn mixed_writers_keep_at_most_one_holder() {
    let reconciler = create_reconciler().await;

    let handles: Vec<_> = (0..24)
        .map(|i| {
            let reconciler = Arc::clone(&reconciler);
            tokio::spawn(async move {
                let venue = format!("venue-{}", i % 6);
                if i % 3 == 0 {
                    reconciler.apply_explicit_status(&venue, true, i % 2 == 0).await
                } else {
                    reconciler.apply_sold_out_signal(&venue, i % 2 == 0).await
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(holders(&reconciler).await.len() <= 1);
}

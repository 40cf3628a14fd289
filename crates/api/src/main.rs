//! Recommendation service entry point.

use std::sync::Arc;

use api::AppState;
use api::config::{Config, LogFormat};
use domain::VenueStatusReconciler;
use messaging::{AmqpBroker, InMemoryBroker, MessageRouter, Publisher, Subscriber};
use metrics_exporter_prometheus::PrometheusHandle;
use recommendation::RecommendationAssembler;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use upstream::{HttpCatalogClient, HttpProfileClient};
use venue_store::{InMemoryVenueStore, PostgresVenueStore, VenueStore};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the venue store
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(&url)
                .await
                .expect("failed to connect to database");
            let store = PostgresVenueStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run database migrations");
            tracing::info!("using PostgreSQL venue store");
            run(config, store, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory venue store");
            run(config, InMemoryVenueStore::new(), metrics_handle).await;
        }
    }
}

async fn run<S>(config: Config, store: S, metrics_handle: PrometheusHandle)
where
    S: VenueStore + Clone + 'static,
{
    // 4. Pick the message broker
    match config.amqp_url.clone() {
        Some(url) => {
            let broker = AmqpBroker::connect(&url, config.amqp_prefetch)
                .await
                .expect("failed to connect to message broker");
            serve(config, store, broker.clone(), metrics_handle).await;
            broker.close().await;
        }
        None => {
            tracing::warn!("AMQP_URL not set, using in-process message broker");
            let broker = InMemoryBroker::new();
            serve(config, store, broker.clone(), metrics_handle).await;
            broker.close().await;
        }
    }

    tracing::info!("server shut down gracefully");
}

async fn serve<S, B>(config: Config, store: S, broker: B, metrics_handle: PrometheusHandle)
where
    S: VenueStore + Clone + 'static,
    B: Publisher + Subscriber + Clone + 'static,
{
    // 5. Upstream clients and discount policy
    let http = config.http_client();
    let profiles = HttpProfileClient::new(&config.user_service, &http)
        .expect("failed to build user service client");
    let catalog = HttpCatalogClient::new(&config.ticket_service, &http)
        .expect("failed to build ticket service client");
    let policy = api::load_policy(&config.policy_path);

    let state = Arc::new(AppState {
        assembler: RecommendationAssembler::new(store.clone(), profiles, catalog, policy),
    });

    // 6. Start the status-change consumers
    let reconciler = Arc::new(VenueStatusReconciler::with_config(
        store,
        config.reconciler(),
    ));
    let mut router = MessageRouter::new(broker, config.router());
    api::consumers::register_handlers(&mut router, reconciler);
    let consumers = router
        .start()
        .await
        .expect("failed to start message router");

    // 7. Serve HTTP until a shutdown signal arrives
    let app = api::create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting recommendation service");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 8. Drain in-flight messages
    consumers.shutdown().await;
}

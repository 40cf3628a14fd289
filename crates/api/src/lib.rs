//! Recommendation service wiring.
//!
//! Provides the HTTP query surface (recommendations, online-ticket status,
//! health and metrics) and the status-change topic handlers, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod consumers;
pub mod error;
pub mod routes;

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use pricing::DiscountPolicy;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use upstream::{CatalogClient, ProfileClient};
use venue_store::VenueStore;

pub use routes::tickets::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, P, C>(state: Arc<AppState<S, P, C>>, metrics_handle: PrometheusHandle) -> Router
where
    S: VenueStore + 'static,
    P: ProfileClient + 'static,
    C: CatalogClient + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route(
            "/api/v1/recommendation",
            get(routes::tickets::recommendation::<S, P, C>),
        )
        .route(
            "/api/v1/online-ticket",
            get(routes::tickets::online_ticket::<S, P, C>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Loads the discount policy, or returns `None` when it cannot be loaded.
///
/// The service still starts without a policy: recommendations answer 503
/// while online-ticket queries keep working.
pub fn load_policy(path: &Path) -> Option<Arc<DiscountPolicy>> {
    match DiscountPolicy::load(path) {
        Ok(policy) => Some(Arc::new(policy)),
        Err(e) => {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "failed to load discount policy, recommendations are disabled"
            );
            None
        }
    }
}

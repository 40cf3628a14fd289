//! Recommendation and online-ticket query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use recommendation::{OnlineTicketStatus, Recommendation, RecommendationAssembler};
use serde::{Deserialize, Serialize};
use upstream::{CatalogClient, ProfileClient};
use venue_store::VenueStore;

use crate::error::ApiError;

/// Header carrying the caller's user id, set by the gateway after token
/// validation.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared application state accessible from all handlers.
pub struct AppState<S, P, C>
where
    S: VenueStore,
    P: ProfileClient,
    C: CatalogClient,
{
    pub assembler: RecommendationAssembler<S, P, C>,
}

#[derive(Debug, Deserialize)]
pub struct OnlineTicketQuery {
    pub region_name: String,
}

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
    pub message: &'static str,
}

/// GET /api/v1/recommendation
#[tracing::instrument(skip(state, headers))]
pub async fn recommendation<S, P, C>(
    State(state): State<Arc<AppState<S, P, C>>>,
    headers: HeaderMap,
) -> Result<Json<DataResponse<Vec<Recommendation>>>, ApiError>
where
    S: VenueStore + 'static,
    P: ProfileClient + 'static,
    C: CatalogClient + 'static,
{
    let user_id = user_id(&headers)?;
    let data = state.assembler.get_recommendation(user_id).await?;

    Ok(Json(DataResponse {
        data,
        message: "Success get recommendation",
    }))
}

/// GET /api/v1/online-ticket?region_name=
#[tracing::instrument(skip(state))]
pub async fn online_ticket<S, P, C>(
    State(state): State<Arc<AppState<S, P, C>>>,
    Query(query): Query<OnlineTicketQuery>,
) -> Result<Json<DataResponse<OnlineTicketStatus>>, ApiError>
where
    S: VenueStore + 'static,
    P: ProfileClient + 'static,
    C: CatalogClient + 'static,
{
    let data = state.assembler.get_online_ticket(&query.region_name).await?;

    Ok(Json(DataResponse {
        data,
        message: "Success get online ticket",
    }))
}

fn user_id(headers: &HeaderMap) -> Result<i64, ApiError> {
    let value = headers
        .get(USER_ID_HEADER)
        .ok_or(ApiError::Unauthorized)?
        .to_str()
        .map_err(|_| ApiError::BadRequest("X-User-Id header is not valid text".to_string()))?;

    value
        .trim()
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid X-User-Id {value:?}: {e}")))
}

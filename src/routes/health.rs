use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::{health::HealthResponse, metrics::MetricsSnapshot},
    services::health_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
/// Return the current health status and the number of live rooms.
pub async fn healthcheck(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(health_service::health_status(&state))
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "health",
    responses((status = 200, description = "Process counters", body = MetricsSnapshot))
)]
/// Return process-wide counters.
pub async fn metrics(State(state): State<SharedState>) -> Json<MetricsSnapshot> {
    Json(health_service::metrics(&state))
}

/// Configure the health routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/healthcheck", get(healthcheck))
        .route("/metrics", get(metrics))
}

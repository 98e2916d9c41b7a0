use crate::{
    dto::{health::HealthResponse, metrics::MetricsSnapshot},
    state::SharedState,
};

/// Health payload; the process is healthy as long as it answers.
pub fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.registry().len())
}

/// Counter snapshot including the current room count.
pub fn metrics(state: &SharedState) -> MetricsSnapshot {
    state.metrics().snapshot(state.registry().len())
}

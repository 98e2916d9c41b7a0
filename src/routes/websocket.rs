use axum::{
    Router,
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, header},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{routes::contest::bearer_token, services::websocket_service, state::SharedState};

/// Query string accepted on the upgrade request.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WsParams {
    /// Signed contest token.
    pub token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/ws/contests/{contest_id}",
    tag = "contest",
    params(
        ("contest_id" = String, Path, description = "Contest to join"),
        WsParams
    ),
    responses((status = 101, description = "Switching protocols to WebSocket; refusals close with 4001/4003/4004"))
)]
/// Upgrade the HTTP connection into a contest WebSocket session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(contest_id): Path<String>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let token = params.token.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .map(str::to_string)
    });

    ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket, contest_id, token))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws/contests/{contest_id}", get(ws_handler))
}

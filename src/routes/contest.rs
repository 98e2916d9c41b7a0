use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_valid::Valid;
use tracing::warn;

use crate::{
    dto::contest::{CreateContestRequest, CreateContestResponse, StandingsResponse},
    error::AppError,
    services::{contest_service, token_service::VerifiedToken},
    state::SharedState,
};

/// Contest creation (bearer protected) and read-only standings.
pub fn router(state: SharedState) -> Router<SharedState> {
    let protected = Router::new()
        .route("/api/contests", post(create_contest))
        .route_layer(middleware::from_fn_with_state(state, require_bearer_token));

    Router::new()
        .route("/api/contests/{contest_id}/standings", get(get_standings))
        .merge(protected)
}

/// Create a contest room, loading its questions once.
#[utoipa::path(
    post,
    path = "/api/contests",
    tag = "contest",
    params(("Authorization" = String, Header, description = "Bearer token; its subject becomes the contest host")),
    request_body = CreateContestRequest,
    responses(
        (status = 200, description = "Room ready", body = CreateContestResponse),
        (status = 400, description = "Invalid body or no playable questions"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 409, description = "Contest id taken by another host"),
        (status = 503, description = "Question bank unavailable")
    )
)]
pub async fn create_contest(
    State(state): State<SharedState>,
    Extension(token): Extension<VerifiedToken>,
    Valid(Json(payload)): Valid<Json<CreateContestRequest>>,
) -> Result<Json<CreateContestResponse>, AppError> {
    Ok(Json(
        contest_service::create_contest(&state, &token, payload).await?,
    ))
}

/// Ranked standings read through the room's command queue.
#[utoipa::path(
    get,
    path = "/api/contests/{contest_id}/standings",
    tag = "contest",
    params(("contest_id" = String, Path, description = "Contest identifier")),
    responses(
        (status = 200, description = "Current standings", body = StandingsResponse),
        (status = 404, description = "Unknown contest")
    )
)]
pub async fn get_standings(
    State(state): State<SharedState>,
    Path(contest_id): Path<String>,
) -> Result<Json<StandingsResponse>, AppError> {
    Ok(Json(contest_service::standings(&state, &contest_id).await?))
}

/// Extract the bearer token from an `Authorization` header value.
pub(crate) fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|token| !token.is_empty())
}

async fn require_bearer_token(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    let verified = state.tokens().verify(token).map_err(|err| {
        warn!(error = %err, "rejected bearer token");
        AppError::Unauthorized(err.to_string())
    })?;

    req.extensions_mut().insert(verified);
    Ok(next.run(req).await)
}

use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the contest engine.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::health::metrics,
        crate::routes::auth::login,
        crate::routes::contest::create_contest,
        crate::routes::contest::get_standings,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::metrics::MetricsSnapshot,
            crate::dto::auth::LoginRequest,
            crate::dto::auth::LoginResponse,
            crate::dto::contest::CreateContestRequest,
            crate::dto::contest::CreateContestResponse,
            crate::dto::contest::StandingsResponse,
            crate::dto::contest::StandingEntry,
            crate::dto::ws::PlayerSummary,
            crate::dto::ws::NewQuestionPayload,
            crate::dto::ws::AnswerResultPayload,
            crate::dto::ws::ScoreUpdatePayload,
            crate::dto::ws::FinalStanding,
            crate::dto::ws::GameOverPayload,
            crate::dto::ws::ErrorPayload,
        )
    ),
    tags(
        (name = "health", description = "Health and counters"),
        (name = "auth", description = "Development token issuing"),
        (name = "contest", description = "Contest rooms and their WebSocket channel"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_public_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/metrics",
            "/login",
            "/api/contests",
            "/api/contests/{contest_id}/standings",
            "/ws/contests/{contest_id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}

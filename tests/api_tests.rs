use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use contest_engine::{
    build_router,
    config::AppConfig,
    dao::{models::QuestionEntity, question_bank::FileQuestionSource, results_sink::LogResultsSink},
    services::{
        persistence_service::PersistenceGateway,
        token_service::{Role, TokenVerifier},
    },
    state::{AppState, SharedState, metrics::Metrics},
};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "integration-secret";

fn entity(id: &str, difficulty: &str) -> QuestionEntity {
    QuestionEntity {
        id: id.into(),
        question: None,
        question_text: Some(format!("Prompt {id}")),
        options: vec!["yes".into(), "no".into()],
        correct_answer: "yes".into(),
        points: 10,
        time_allocation_seconds: 30,
        difficulty: Some(difficulty.into()),
        is_active: true,
    }
}

fn state_with(login_enabled: bool) -> SharedState {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = SECRET.into();
    config.auth.login_enabled = login_enabled;

    let bank = FileQuestionSource::new(
        "fixture",
        vec![
            entity("e1", "easy"),
            entity("e2", "easy"),
            entity("e3", "easy"),
            entity("h1", "hard"),
        ],
    );
    let metrics = Arc::new(Metrics::default());
    let persistence =
        PersistenceGateway::new(Arc::new(LogResultsSink), config.retry, metrics.clone());
    AppState::new(config, Arc::new(bank), persistence, metrics)
}

fn token(user_id: &str, role: Role) -> String {
    TokenVerifier::new(SECRET, Duration::from_secs(5))
        .issue(user_id, user_id, None, role, Duration::from_secs(600))
        .unwrap()
        .token
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn create_request(bearer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post("/api/contests").header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn healthcheck_reports_room_count() {
    let app = build_router(state_with(false));
    let (status, body) = send(&app, get("/healthcheck")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "active_rooms": 0}));
}

#[tokio::test]
async fn create_contest_requires_bearer_token() {
    let app = build_router(state_with(false));
    let body = json!({"name": "Weekly", "difficulty": "easy"});

    let (status, _) = send(&app, create_request(None, body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, create_request(Some("not-a-jwt"), body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_contest_opens_waiting_room() {
    let state = state_with(false);
    let app = build_router(state.clone());
    let host = token("host-1", Role::Host);

    let (status, body) = send(
        &app,
        create_request(
            Some(&host),
            json!({"contest_id": "weekly-7", "name": " Weekly ", "difficulty": "Easy", "question_count": 2}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["contest_id"], "weekly-7");
    assert_eq!(body["name"], "Weekly");
    assert_eq!(body["difficulty"], "easy");
    assert_eq!(body["question_count"], 2);
    assert_eq!(body["status"], "waiting");
    assert_eq!(body["websocket_url"], "ws://localhost:8080/ws/contests/weekly-7");

    let (status, standings) = send(&app, get("/api/contests/weekly-7/standings")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(standings["status"], "waiting");
    assert_eq!(standings["total_questions"], 2);
    assert_eq!(standings["standings"], json!([]));

    let (_, metrics) = send(&app, get("/metrics")).await;
    assert_eq!(metrics["rooms_created"], 1);
    assert_eq!(metrics["active_rooms"], 1);
}

#[tokio::test]
async fn repeated_creation_is_idempotent_for_the_same_host() {
    let app = build_router(state_with(false));
    let host = token("host-1", Role::Host);
    let body = json!({"contest_id": "dup", "name": "Dup", "difficulty": "easy"});

    let (status, _) = send(&app, create_request(Some(&host), body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, again) = send(&app, create_request(Some(&host), body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["message"], "Contest room already exists");

    let intruder = token("host-2", Role::Host);
    let (status, _) = send(&app, create_request(Some(&intruder), body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_creation_requests_are_rejected() {
    let app = build_router(state_with(false));
    let host = token("host-1", Role::Host);

    let (status, _) = send(
        &app,
        create_request(Some(&host), json!({"name": "X", "difficulty": "extreme"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        create_request(
            Some(&host),
            json!({"name": "X", "selected_question_ids": ["missing"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        create_request(
            Some(&host),
            json!({"contest_id": "repeat", "name": "X", "selected_question_ids": ["e1", "e1"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, get("/api/contests/repeat/standings")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn standings_for_unknown_contest_is_not_found() {
    let app = build_router(state_with(false));
    let (status, body) = send(&app, get("/api/contests/nope/standings")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn login_is_disabled_by_default() {
    let app = build_router(state_with(false));
    let request = Request::post("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"username": "ann"}).to_string()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn login_issues_verifiable_token() {
    let state = state_with(true);
    let app = build_router(state.clone());
    let request = Request::post("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"username": "ann", "user_id": "u-ann", "role": "admin", "contest_id": "c1"})
                .to_string(),
        ))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "u-ann");

    let verified = state.tokens().verify(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(verified.user_id, "u-ann");
    assert_eq!(verified.username, "ann");
    assert_eq!(verified.role, Role::Player);
    assert_eq!(verified.contest_id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = build_router(state_with(false));
    let (status, body) = send(&app, get("/api-doc/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/contests"].is_object());
}

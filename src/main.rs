//! Contest engine binary entrypoint wiring REST, WebSocket rooms, and the external stores.

use std::{env, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contest_engine::{
    build_router,
    config::AppConfig,
    dao::{
        http::HttpEndpointConfig,
        question_bank::{FileQuestionSource, HttpQuestionSource, QuestionSource},
        results_sink::{HttpResultsSink, LogResultsSink, ResultsSink},
    },
    services::{persistence_service::PersistenceGateway, room_reaper},
    state::{AppState, metrics::Metrics},
};

const DEFAULT_QUESTION_BANK_PATH: &str = "config/questions.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let questions = build_question_source(&config)?;
    let sink = build_results_sink(&config)?;
    info!(
        questions = %questions.describe(),
        results = %sink.describe(),
        "external stores configured"
    );

    let metrics = Arc::new(Metrics::default());
    let persistence = PersistenceGateway::new(sink, config.retry, metrics.clone());
    let app_state = AppState::new(config, questions, persistence, metrics);

    tokio::spawn(room_reaper::run(app_state.clone()));
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

fn endpoint(config: &AppConfig, url: &str) -> HttpEndpointConfig {
    let endpoint = HttpEndpointConfig::new(url);
    match &config.integrations.service_token {
        Some(token) => endpoint.with_bearer_token(token.clone()),
        None => endpoint,
    }
}

/// Remote bank when a URL is set, otherwise the local problem-set file.
fn build_question_source(config: &AppConfig) -> anyhow::Result<Arc<dyn QuestionSource>> {
    if let Some(url) = &config.integrations.question_bank_url {
        let source = HttpQuestionSource::new(endpoint(config, url))
            .context("building question bank client")?;
        return Ok(Arc::new(source));
    }

    let path = config
        .integrations
        .question_bank_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_QUESTION_BANK_PATH));
    match FileQuestionSource::from_path(&path) {
        Ok(source) => {
            info!(path = %path.display(), questions = source.len(), "loaded question bank file");
            Ok(Arc::new(source))
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "question bank unavailable; contest creation will fail until one is configured"
            );
            Ok(Arc::new(FileQuestionSource::new(path.display().to_string(), Vec::new())))
        }
    }
}

fn build_results_sink(config: &AppConfig) -> anyhow::Result<Arc<dyn ResultsSink>> {
    match &config.integrations.save_results_url {
        Some(url) => {
            let sink = HttpResultsSink::new(endpoint(config, url))
                .context("building save-results client")?;
            Ok(Arc::new(sink))
        }
        None => {
            warn!("SAVE_RESULTS_URL not set; finished contests are only logged");
            Ok(Arc::new(LogResultsSink))
        }
    }
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

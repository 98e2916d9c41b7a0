pub mod contest;
pub mod metrics;
pub mod registry;
pub mod room;
pub mod state_machine;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    dao::question_bank::QuestionSource,
    services::{persistence_service::PersistenceGateway, room_actor::RoomDeps, token_service::TokenVerifier},
};

use self::{metrics::Metrics, registry::RoomRegistry};

pub type SharedState = Arc<AppState>;

/// Central application state: configuration, collaborators and the room registry.
pub struct AppState {
    config: Arc<AppConfig>,
    registry: RoomRegistry,
    tokens: TokenVerifier,
    questions: Arc<dyn QuestionSource>,
    persistence: PersistenceGateway,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        questions: Arc<dyn QuestionSource>,
        persistence: PersistenceGateway,
        metrics: Arc<Metrics>,
    ) -> SharedState {
        let tokens = TokenVerifier::new(&config.auth.jwt_secret, config.auth.leeway);
        Arc::new(Self {
            config: Arc::new(config),
            registry: RoomRegistry::new(),
            tokens,
            questions,
            persistence,
            metrics,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    /// Contest id → room table.
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Token verifier (and development issuer).
    pub fn tokens(&self) -> &TokenVerifier {
        &self.tokens
    }

    /// Question source consulted when a room is created.
    pub fn questions(&self) -> &Arc<dyn QuestionSource> {
        &self.questions
    }

    /// Process counters.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Collaborators handed to each new room actor.
    pub fn room_deps(&self) -> RoomDeps {
        RoomDeps {
            persistence: self.persistence.clone(),
            metrics: self.metrics.clone(),
            queue_capacity: self.config.rooms.command_queue_capacity,
        }
    }
}

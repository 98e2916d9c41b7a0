//! Application-level configuration loading: JSON file first, then environment overrides.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use rand::{Rng, distr::Alphanumeric, rng};
use serde::Deserialize;
use tracing::{info, warn};

use crate::services::{persistence_service::RetryPolicy, scoring::ScoringRules};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CONTEST_ENGINE_CONFIG_PATH";

const JWT_SECRET_ENV: &str = "JWT_SECRET";
const SAVE_RESULTS_URL_ENV: &str = "SAVE_RESULTS_URL";
const QUESTION_BANK_URL_ENV: &str = "QUESTION_BANK_URL";
const QUESTION_BANK_PATH_ENV: &str = "QUESTION_BANK_PATH";
const PUBLIC_WS_BASE_URL_ENV: &str = "PUBLIC_WS_BASE_URL";
const SERVICE_TOKEN_ENV: &str = "SERVICE_TOKEN";

/// Token verification and development login settings.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// HMAC secret shared with the token issuer.
    pub jwt_secret: String,
    /// Clock skew tolerated on `exp`.
    pub leeway: Duration,
    /// Whether `POST /login` mints tokens.
    pub login_enabled: bool,
    /// Lifetime of tokens minted by `POST /login`.
    pub login_token_ttl: Duration,
}

/// Room actor and connection tunables.
#[derive(Debug, Clone)]
pub struct RoomSettingsConfig {
    /// Pause between a question timeout and the next question.
    pub intermission: Duration,
    /// Bounded command queue per room.
    pub command_queue_capacity: usize,
    /// Bounded outbound frame buffer per socket.
    pub outbound_buffer: usize,
    /// Maximum time a single socket write may take.
    pub write_timeout: Duration,
    /// How long a finished room stays reachable.
    pub finished_grace: Duration,
    /// How long a waiting room with nobody connected is kept.
    pub idle_timeout: Duration,
    /// Reaper scan period.
    pub reaper_interval: Duration,
    /// Create rooms on a WebSocket join by a host/admin token.
    pub lazy_creation: bool,
    /// Question count used when the request omits it.
    pub default_question_count: u32,
    /// Contest time budget used when the request omits it.
    pub default_duration_minutes: Option<u32>,
}

/// Where questions come from and where results go.
#[derive(Debug, Clone)]
pub struct IntegrationSettings {
    /// Remote problem-set endpoint.
    pub question_bank_url: Option<String>,
    /// Local problem-set JSON file.
    pub question_bank_path: Option<PathBuf>,
    /// Bulk save-results endpoint.
    pub save_results_url: Option<String>,
    /// Bearer token presented to both endpoints.
    pub service_token: Option<String>,
    /// Base advertised to clients in `websocket_url`.
    pub public_ws_base_url: String,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Token settings.
    pub auth: AuthSettings,
    /// Scoring parameters handed to every room.
    pub scoring: ScoringRules,
    /// Room and socket tunables.
    pub rooms: RoomSettingsConfig,
    /// Save-results retry policy.
    pub retry: RetryPolicy,
    /// External endpoints.
    pub integrations: IntegrationSettings,
}

impl AppConfig {
    /// Load the configuration from disk, fall back to defaults, then apply environment overrides.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let raw = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    RawConfig::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                RawConfig::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                RawConfig::default()
            }
        };

        let mut config = Self::from(raw);
        config.apply_env_overrides();
        config.ensure_secret();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Some(secret) = env_value(JWT_SECRET_ENV) {
            self.auth.jwt_secret = secret;
        }
        if let Some(url) = env_value(SAVE_RESULTS_URL_ENV) {
            self.integrations.save_results_url = Some(url);
        }
        if let Some(url) = env_value(QUESTION_BANK_URL_ENV) {
            self.integrations.question_bank_url = Some(url);
        }
        if let Some(path) = env_value(QUESTION_BANK_PATH_ENV) {
            self.integrations.question_bank_path = Some(PathBuf::from(path));
        }
        if let Some(base) = env_value(PUBLIC_WS_BASE_URL_ENV) {
            self.integrations.public_ws_base_url = base;
        }
        if let Some(token) = env_value(SERVICE_TOKEN_ENV) {
            self.integrations.service_token = Some(token);
        }
    }

    fn ensure_secret(&mut self) {
        if !self.auth.jwt_secret.is_empty() {
            return;
        }
        warn!("no JWT secret configured; generated an ephemeral one, externally minted tokens will be rejected");
        self.auth.jwt_secret = rng()
            .sample_iter(&Alphanumeric)
            .take(48)
            .map(char::from)
            .collect();
    }

    /// Advertised WebSocket URL for a contest.
    pub fn websocket_url(&self, contest_id: &str) -> String {
        format!(
            "{}/ws/contests/{contest_id}",
            self.integrations.public_ws_base_url.trim_end_matches('/')
        )
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from(RawConfig::default())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    auth: RawAuth,
    scoring: RawScoring,
    rooms: RawRooms,
    persistence: RawPersistence,
    integrations: RawIntegrations,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawAuth {
    jwt_secret: String,
    leeway_seconds: u64,
    login_enabled: bool,
    login_token_ttl_seconds: u64,
}

impl Default for RawAuth {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            leeway_seconds: 5,
            login_enabled: false,
            login_token_ttl_seconds: 3_600,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawScoring {
    scale_factor: f64,
    min_correct_ratio: f64,
}

impl Default for RawScoring {
    fn default() -> Self {
        let rules = ScoringRules::default();
        Self {
            scale_factor: rules.scale_factor,
            min_correct_ratio: rules.min_correct_ratio,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawRooms {
    intermission_ms: u64,
    command_queue_capacity: usize,
    outbound_buffer: usize,
    write_timeout_ms: u64,
    finished_grace_seconds: u64,
    idle_timeout_seconds: u64,
    reaper_interval_seconds: u64,
    lazy_creation: bool,
    default_question_count: u32,
    default_duration_minutes: Option<u32>,
}

impl Default for RawRooms {
    fn default() -> Self {
        Self {
            intermission_ms: 3_000,
            command_queue_capacity: 256,
            outbound_buffer: 64,
            write_timeout_ms: 5_000,
            finished_grace_seconds: 300,
            idle_timeout_seconds: 1_800,
            reaper_interval_seconds: 30,
            lazy_creation: false,
            default_question_count: 10,
            default_duration_minutes: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawPersistence {
    attempts: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
}

impl Default for RawPersistence {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            attempts: policy.attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawIntegrations {
    question_bank_url: Option<String>,
    question_bank_path: Option<PathBuf>,
    save_results_url: Option<String>,
    service_token: Option<String>,
    public_ws_base_url: String,
}

impl Default for RawIntegrations {
    fn default() -> Self {
        Self {
            question_bank_url: None,
            question_bank_path: None,
            save_results_url: None,
            service_token: None,
            public_ws_base_url: "ws://localhost:8080".into(),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let RawConfig {
            auth,
            scoring,
            rooms,
            persistence,
            integrations,
        } = value;

        Self {
            auth: AuthSettings {
                jwt_secret: auth.jwt_secret,
                leeway: Duration::from_secs(auth.leeway_seconds),
                login_enabled: auth.login_enabled,
                login_token_ttl: Duration::from_secs(auth.login_token_ttl_seconds.max(1)),
            },
            scoring: ScoringRules {
                scale_factor: scoring.scale_factor.max(0.0),
                min_correct_ratio: scoring.min_correct_ratio.clamp(0.0, 1.0),
            },
            rooms: RoomSettingsConfig {
                intermission: Duration::from_millis(rooms.intermission_ms),
                command_queue_capacity: rooms.command_queue_capacity.max(1),
                outbound_buffer: rooms.outbound_buffer.max(1),
                write_timeout: Duration::from_millis(rooms.write_timeout_ms.max(1)),
                finished_grace: Duration::from_secs(rooms.finished_grace_seconds),
                idle_timeout: Duration::from_secs(rooms.idle_timeout_seconds),
                reaper_interval: Duration::from_secs(rooms.reaper_interval_seconds.max(1)),
                lazy_creation: rooms.lazy_creation,
                default_question_count: rooms.default_question_count.clamp(1, 50),
                default_duration_minutes: rooms.default_duration_minutes,
            },
            retry: RetryPolicy {
                attempts: persistence.attempts.max(1),
                initial_backoff: Duration::from_millis(persistence.initial_backoff_ms),
                max_backoff: Duration::from_millis(persistence.max_backoff_ms),
            },
            integrations: IntegrationSettings {
                question_bank_url: integrations.question_bank_url.filter(|url| !url.is_empty()),
                question_bank_path: integrations.question_bank_path,
                save_results_url: integrations.save_results_url.filter(|url| !url.is_empty()),
                service_token: integrations.service_token.filter(|token| !token.is_empty()),
                public_ws_base_url: integrations.public_ws_base_url,
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

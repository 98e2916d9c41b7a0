use serde::Serialize;
use utoipa::ToSchema;

/// Counter snapshot returned by `/metrics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MetricsSnapshot {
    /// Rooms currently registered.
    pub active_rooms: usize,
    pub rooms_created: u64,
    pub rooms_evicted: u64,
    pub connections_opened: u64,
    /// Upgrades closed because of a bad token or an unknown contest.
    pub connections_rejected: u64,
    /// Sockets dropped because their outbound buffer was full.
    pub slow_consumers_dropped: u64,
    pub answers_accepted: u64,
    pub answers_rejected: u64,
    pub contests_finished: u64,
    pub persistence_succeeded: u64,
    pub persistence_failed: u64,
    /// Save attempts repeated after a transient failure.
    pub persistence_retried: u64,
}

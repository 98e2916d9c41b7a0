use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::{
    services::contest_service,
    state::{SharedState, room::RoomLifecycle, state_machine::ContestStatus},
};

/// Periodically evict finished rooms past their grace period and idle waiting rooms.
pub async fn run(state: SharedState) {
    let rooms = state.config().rooms.clone();
    let mut ticker = interval(rooms.reaper_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        interval = ?rooms.reaper_interval,
        grace = ?rooms.finished_grace,
        idle = ?rooms.idle_timeout,
        "room reaper started"
    );

    loop {
        ticker.tick().await;
        let evicted = sweep(&state, Instant::now(), rooms.finished_grace, rooms.idle_timeout).await;
        if evicted > 0 {
            info!(evicted, remaining = state.registry().len(), "reaper pass complete");
        } else {
            debug!(remaining = state.registry().len(), "reaper pass complete");
        }
    }
}

/// Why a room should go, if it should.
pub fn eviction_reason(
    lifecycle: &RoomLifecycle,
    now: Instant,
    finished_grace: Duration,
    idle_timeout: Duration,
) -> Option<&'static str> {
    match lifecycle.status {
        ContestStatus::Finished => lifecycle
            .finished_at
            .filter(|finished| now.saturating_duration_since(*finished) >= finished_grace)
            .map(|_| "finished grace period elapsed"),
        ContestStatus::Waiting
            if lifecycle.connected == 0
                && now.saturating_duration_since(lifecycle.last_activity) >= idle_timeout =>
        {
            Some("idle waiting room")
        }
        _ => None,
    }
}

/// One scan over the registry. Returns the number of rooms evicted.
pub async fn sweep(
    state: &SharedState,
    now: Instant,
    finished_grace: Duration,
    idle_timeout: Duration,
) -> usize {
    let mut evicted = 0;
    for handle in state.registry().handles() {
        let reason = if handle.is_closed() {
            Some("room actor stopped")
        } else {
            eviction_reason(&handle.lifecycle(), now, finished_grace, idle_timeout)
        };

        let Some(reason) = reason else {
            continue;
        };
        if contest_service::evict_room(state, handle.contest_id(), reason).await {
            evicted += 1;
        }
    }
    evicted
}

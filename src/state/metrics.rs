use std::sync::atomic::{AtomicU64, Ordering};

use crate::dto::metrics::MetricsSnapshot;

/// Process-wide counters exposed on `/metrics`.
#[derive(Debug, Default)]
pub struct Metrics {
    rooms_created: AtomicU64,
    rooms_evicted: AtomicU64,
    connections_opened: AtomicU64,
    connections_rejected: AtomicU64,
    slow_consumers_dropped: AtomicU64,
    answers_accepted: AtomicU64,
    answers_rejected: AtomicU64,
    contests_finished: AtomicU64,
    persistence_succeeded: AtomicU64,
    persistence_failed: AtomicU64,
    persistence_retried: AtomicU64,
}

macro_rules! counter {
    ($name:ident, $field:ident) => {
        #[doc = concat!("Increment `", stringify!($field), "`.")]
        pub fn $name(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl Metrics {
    counter!(room_created, rooms_created);
    counter!(room_evicted, rooms_evicted);
    counter!(connection_opened, connections_opened);
    counter!(connection_rejected, connections_rejected);
    counter!(slow_consumer_dropped, slow_consumers_dropped);
    counter!(answer_accepted, answers_accepted);
    counter!(answer_rejected, answers_rejected);
    counter!(contest_finished, contests_finished);
    counter!(persistence_succeeded, persistence_succeeded);
    counter!(persistence_failed, persistence_failed);
    counter!(persistence_retried, persistence_retried);

    /// Read every counter. Values are individually consistent only.
    pub fn snapshot(&self, active_rooms: usize) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            active_rooms,
            rooms_created: load(&self.rooms_created),
            rooms_evicted: load(&self.rooms_evicted),
            connections_opened: load(&self.connections_opened),
            connections_rejected: load(&self.connections_rejected),
            slow_consumers_dropped: load(&self.slow_consumers_dropped),
            answers_accepted: load(&self.answers_accepted),
            answers_rejected: load(&self.answers_rejected),
            contests_finished: load(&self.contests_finished),
            persistence_succeeded: load(&self.persistence_succeeded),
            persistence_failed: load(&self.persistence_failed),
            persistence_retried: load(&self.persistence_retried),
        }
    }
}

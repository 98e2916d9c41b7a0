use std::{future::Future, sync::Arc};

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::services::room_actor::RoomHandle;

type Slot = Arc<OnceCell<RoomHandle>>;

/// Process-wide table from contest id to its running room.
///
/// Creation is single-flight per key: concurrent callers for the same id share
/// one initialisation, so at most one room exists per contest.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Slot>,
}

impl RoomRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the room for `contest_id`, running `init` if none exists yet.
    ///
    /// The boolean is true when this call created the room. A failed `init`
    /// leaves no entry behind so a later call can retry.
    pub async fn get_or_create<F, Fut, E>(
        &self,
        contest_id: &str,
        init: F,
    ) -> Result<(RoomHandle, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RoomHandle, E>>,
    {
        let slot = self
            .rooms
            .entry(contest_id.to_string())
            .or_default()
            .value()
            .clone();

        let mut created = false;
        let result = slot
            .get_or_try_init(|| async {
                let handle = init().await?;
                created = true;
                Ok(handle)
            })
            .await;

        match result {
            Ok(handle) => Ok((handle.clone(), created)),
            Err(err) => {
                self.rooms
                    .remove_if(contest_id, |_, current| {
                        Arc::ptr_eq(current, &slot) && current.get().is_none()
                    });
                Err(err)
            }
        }
    }

    /// Running room for `contest_id`, if any.
    pub fn get(&self, contest_id: &str) -> Option<RoomHandle> {
        self.rooms
            .get(contest_id)
            .and_then(|slot| slot.value().get().cloned())
    }

    /// Remove the entry for `contest_id`, returning its handle.
    pub fn evict(&self, contest_id: &str) -> Option<RoomHandle> {
        self.rooms
            .remove(contest_id)
            .and_then(|(_, slot)| slot.get().cloned())
    }

    /// Number of initialised rooms.
    pub fn len(&self) -> usize {
        self.rooms
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    /// Whether no room is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every initialised room handle.
    pub fn handles(&self) -> Vec<RoomHandle> {
        self.rooms
            .iter()
            .filter_map(|entry| entry.value().get().cloned())
            .collect()
    }
}

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle of a contest room. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContestStatus {
    /// Players gather; only the host can start.
    Waiting,
    /// Questions are being played.
    InProgress,
    /// Final scoreboard is fixed (terminal).
    Finished,
}

impl ContestStatus {
    /// Wire label used in logs and persisted rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContestStatus::Waiting => "waiting",
            ContestStatus::InProgress => "in_progress",
            ContestStatus::Finished => "finished",
        }
    }
}

/// Events that can be applied to the room status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContestEvent {
    /// Host started the contest.
    Start,
    /// Last question elapsed or the contest ran out of time.
    Finish,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the machine was in.
    pub from: ContestStatus,
    /// Rejected event.
    pub event: ContestEvent,
}

/// Status holder that only moves forward.
#[derive(Debug, Clone)]
pub struct ContestStateMachine {
    status: ContestStatus,
}

impl Default for ContestStateMachine {
    fn default() -> Self {
        Self {
            status: ContestStatus::Waiting,
        }
    }
}

impl ContestStateMachine {
    /// Create a machine in the waiting status.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn status(&self) -> ContestStatus {
        self.status
    }

    /// Validate and apply an event, returning the new status.
    pub fn apply(&mut self, event: ContestEvent) -> Result<ContestStatus, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.status = next;
        Ok(next)
    }

    /// Check an event without applying it.
    pub fn can_apply(&self, event: ContestEvent) -> bool {
        self.compute_transition(event).is_ok()
    }

    fn compute_transition(&self, event: ContestEvent) -> Result<ContestStatus, InvalidTransition> {
        let next = match (self.status, event) {
            (ContestStatus::Waiting, ContestEvent::Start) => ContestStatus::InProgress,
            (ContestStatus::InProgress, ContestEvent::Finish) => ContestStatus::Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_waiting() {
        let sm = ContestStateMachine::new();
        assert_eq!(sm.status(), ContestStatus::Waiting);
    }

    #[test]
    fn full_happy_path() {
        let mut sm = ContestStateMachine::new();
        assert_eq!(sm.apply(ContestEvent::Start), Ok(ContestStatus::InProgress));
        assert_eq!(sm.apply(ContestEvent::Finish), Ok(ContestStatus::Finished));
        assert!(!sm.can_apply(ContestEvent::Finish));
    }

    #[test]
    fn status_never_regresses() {
        let mut sm = ContestStateMachine::new();
        sm.apply(ContestEvent::Start).unwrap();
        let err = sm.apply(ContestEvent::Start).unwrap_err();
        assert_eq!(err.from, ContestStatus::InProgress);

        sm.apply(ContestEvent::Finish).unwrap();
        assert!(!sm.can_apply(ContestEvent::Start));
        assert!(!sm.can_apply(ContestEvent::Finish));
        assert_eq!(sm.status(), ContestStatus::Finished);
    }

    #[test]
    fn cannot_finish_before_start() {
        let mut sm = ContestStateMachine::new();
        let err = sm.apply(ContestEvent::Finish).unwrap_err();
        assert_eq!(
            err,
            InvalidTransition {
                from: ContestStatus::Waiting,
                event: ContestEvent::Finish
            }
        );
    }
}

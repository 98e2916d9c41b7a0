use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::{validate_difficulty, validate_unique_ids},
    state::state_machine::ContestStatus,
};

fn default_difficulty() -> String {
    "medium".into()
}

/// Payload used to create a contest room.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct CreateContestRequest {
    /// Externally assigned id. When omitted a UUID is generated; when reused the
    /// existing room is returned unchanged.
    #[serde(default)]
    #[validate(length(min = 1, max = 128))]
    pub contest_id: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    /// One of `easy`, `medium`, `hard`.
    #[serde(default = "default_difficulty")]
    #[validate(custom(function = validate_difficulty))]
    pub difficulty: String,
    #[serde(default)]
    #[validate(range(min = 1, max = 50))]
    pub question_count: Option<u32>,
    /// Overall time budget measured from the start.
    #[serde(default)]
    #[validate(range(min = 1, max = 240))]
    pub duration_minutes: Option<u32>,
    /// Explicit problem-set ids, played in the given order. Each id at most once.
    #[serde(default)]
    #[validate(length(max = 50), custom(function = validate_unique_ids))]
    pub selected_question_ids: Vec<String>,
}

/// Response returned once the room exists.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateContestResponse {
    pub contest_id: String,
    pub name: String,
    pub difficulty: String,
    /// Number of questions actually loaded.
    pub question_count: usize,
    pub status: ContestStatus,
    /// Where clients connect, without the token query parameter.
    pub websocket_url: String,
    pub message: String,
}

/// One ranked row of the live standings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StandingEntry {
    pub rank: usize,
    pub user_id: String,
    pub username: String,
    pub score: u32,
    pub time_spent_ms: u64,
    pub connected: bool,
}

/// Read-only view of a room produced by its actor.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StandingsResponse {
    pub contest_id: String,
    pub name: String,
    pub status: ContestStatus,
    /// `null` until the first question is broadcast.
    pub current_question_index: Option<usize>,
    pub total_questions: usize,
    pub standings: Vec<StandingEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> CreateContestRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn minimal_request_uses_defaults() {
        let payload = request(r#"{"name":"Friday quiz"}"#);
        assert_eq!(payload.difficulty, "medium");
        assert!(payload.question_count.is_none());
        assert!(payload.selected_question_ids.is_empty());
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn rejects_repeated_question_ids() {
        assert!(
            request(r#"{"name":"q","selected_question_ids":["q1","q2","q1"]}"#)
                .validate()
                .is_err()
        );
        assert!(
            request(r#"{"name":"q","selected_question_ids":["q1","q2"]}"#)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(request(r#"{"name":""}"#).validate().is_err());
        assert!(
            request(r#"{"name":"q","question_count":0}"#)
                .validate()
                .is_err()
        );
        assert!(
            request(r#"{"name":"q","duration_minutes":241}"#)
                .validate()
                .is_err()
        );
        assert!(
            request(r#"{"name":"q","difficulty":"brutal"}"#)
                .validate()
                .is_err()
        );
    }
}

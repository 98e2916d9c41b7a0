use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use thiserror::Error;
use utoipa::ToSchema;

/// Close code sent when the upgrade token has expired.
pub const CLOSE_TOKEN_EXPIRED: u16 = 4001;
/// Close code sent when the upgrade token is invalid or scoped to another contest.
pub const CLOSE_TOKEN_INVALID: u16 = 4003;
/// Close code sent when the contest is unknown.
pub const CLOSE_CONTEST_NOT_FOUND: u16 = 4004;
/// Close code sent when the room is evicted while sockets are still attached.
pub const CLOSE_ROOM_CLOSED: u16 = 4010;

/// Commands accepted from contest WebSocket clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Host asks to begin the contest.
    StartGame,
    /// Answer for the live question.
    SubmitAnswer {
        /// Question the client believes is live.
        question_id: String,
        /// Selected option text.
        answer: String,
    },
    /// Any other `type`; ignored by the server.
    Unknown(String),
}

/// Errors raised while decoding a client frame.
#[derive(Debug, Error)]
pub enum ClientMessageError {
    /// Frame is not a JSON envelope with a `type` field.
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),
    /// Envelope type is known but its fields are not.
    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl RawEnvelope {
    /// Fields live either under `payload` or flat next to `type`.
    fn body<T: DeserializeOwned>(self) -> Result<T, ClientMessageError> {
        let value = match self.payload {
            Some(Value::Object(map)) => Value::Object(map),
            _ => Value::Object(self.rest),
        };
        serde_json::from_value(value).map_err(|source| ClientMessageError::InvalidPayload {
            kind: self.kind,
            source,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SubmitAnswerBody {
    #[serde(alias = "questionId")]
    question_id: String,
    answer: String,
}

impl ClientMessage {
    /// Decode a `{type, payload}` frame.
    pub fn from_json_str(raw: &str) -> Result<Self, ClientMessageError> {
        let envelope =
            serde_json::from_str::<RawEnvelope>(raw).map_err(ClientMessageError::Malformed)?;

        match envelope.kind.as_str() {
            "START_GAME" => Ok(ClientMessage::StartGame),
            "SUBMIT_ANSWER" => {
                let body = envelope.body::<SubmitAnswerBody>()?;
                Ok(ClientMessage::SubmitAnswer {
                    question_id: body.question_id,
                    answer: body.answer,
                })
            }
            _ => Ok(ClientMessage::Unknown(envelope.kind)),
        }
    }
}

/// Events pushed to contest WebSocket clients as `{type, payload}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// A new participant entered the roster.
    PlayerJoined(PlayerJoinedPayload),
    /// Roster refresh (reconnects, late joiners).
    PlayerList(PlayerListPayload),
    /// A participant lost its last socket.
    PlayerLeft(PlayerLeftPayload),
    /// Host started the contest.
    ContestStarted(ContestStartedPayload),
    /// A question is live.
    NewQuestion(NewQuestionPayload),
    /// The live question's deadline elapsed.
    QuestionTimeout(QuestionTimeoutPayload),
    /// Verdict for the sender's submission.
    AnswerResult(AnswerResultPayload),
    /// Someone's score changed.
    ScoreUpdate(ScoreUpdatePayload),
    /// Final ranked scoreboard.
    GameOver(GameOverPayload),
    /// Rejected command.
    Error(ErrorPayload),
}

/// Roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlayerSummary {
    pub user_id: String,
    pub username: String,
    pub score: u32,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerJoinedPayload {
    pub user_id: String,
    pub username: String,
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerListPayload {
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerLeftPayload {
    pub user_id: String,
    pub username: String,
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ContestStartedPayload {
    pub message: String,
    pub total_questions: usize,
    pub players: Vec<PlayerSummary>,
}

/// Live question. `timer` is the number of whole seconds left.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NewQuestionPayload {
    pub question_id: String,
    pub question_text: String,
    pub options: Vec<String>,
    pub question_number: usize,
    pub total_questions: usize,
    pub timer: u64,
    pub points: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionTimeoutPayload {
    pub question_id: String,
    pub correct_answer: String,
}

/// `time_taken` is expressed in seconds.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerResultPayload {
    pub accepted: bool,
    pub question_id: String,
    pub is_correct: bool,
    pub new_score: u32,
    pub points_awarded: u32,
    pub time_taken: f64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScoreUpdatePayload {
    pub user_id: String,
    pub username: String,
    pub score: u32,
    pub points_earned: u32,
}

/// Final scoreboard row, camelCase like the persisted result rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinalStanding {
    pub user_id: String,
    pub username: String,
    pub score: u32,
    pub rank: usize,
    pub time_spent_ms: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameOverPayload {
    pub message: String,
    pub final_scoreboard: Vec<FinalStanding>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_game_without_payload() {
        let message = ClientMessage::from_json_str(r#"{"type":"START_GAME"}"#).unwrap();
        assert_eq!(message, ClientMessage::StartGame);
    }

    #[test]
    fn parses_flat_submit_answer() {
        let message = ClientMessage::from_json_str(
            r#"{"type":"SUBMIT_ANSWER","question_id":"q1","answer":"JavaScript"}"#,
        )
        .unwrap();
        assert_eq!(
            message,
            ClientMessage::SubmitAnswer {
                question_id: "q1".into(),
                answer: "JavaScript".into()
            }
        );
    }

    #[test]
    fn parses_enveloped_submit_answer() {
        let message = ClientMessage::from_json_str(
            r#"{"type":"SUBMIT_ANSWER","payload":{"questionId":"q2","answer":"True"}}"#,
        )
        .unwrap();
        assert_eq!(
            message,
            ClientMessage::SubmitAnswer {
                question_id: "q2".into(),
                answer: "True".into()
            }
        );
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let message = ClientMessage::from_json_str(r#"{"type":"DANCE","payload":{}}"#).unwrap();
        assert_eq!(message, ClientMessage::Unknown("DANCE".into()));
    }

    #[test]
    fn submit_without_question_is_invalid() {
        let err = ClientMessage::from_json_str(r#"{"type":"SUBMIT_ANSWER","answer":"x"}"#)
            .unwrap_err();
        assert!(matches!(err, ClientMessageError::InvalidPayload { .. }));
    }

    #[test]
    fn garbage_is_malformed() {
        let err = ClientMessage::from_json_str("not json").unwrap_err();
        assert!(matches!(err, ClientMessageError::Malformed(_)));
    }

    #[test]
    fn server_messages_use_type_payload_envelope() {
        let message = ServerMessage::QuestionTimeout(QuestionTimeoutPayload {
            question_id: "q1".into(),
            correct_answer: "4".into(),
        });
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "QUESTION_TIMEOUT");
        assert_eq!(value["payload"]["correct_answer"], "4");
    }

    #[test]
    fn rejected_answer_omits_nothing_but_reason_when_absent() {
        let message = ServerMessage::AnswerResult(AnswerResultPayload {
            accepted: true,
            question_id: "q1".into(),
            is_correct: true,
            new_score: 8,
            points_awarded: 8,
            time_taken: 5.0,
            reason: None,
        });
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "ANSWER_RESULT");
        assert!(value["payload"].get("reason").is_none());
        assert_eq!(value["payload"]["points_awarded"], 8);
    }

    #[test]
    fn final_scoreboard_rows_are_camel_case() {
        let row = FinalStanding {
            user_id: "u1".into(),
            username: "Ada".into(),
            score: 3,
            rank: 1,
            time_spent_ms: 10,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["timeSpentMs"], 10);
    }
}

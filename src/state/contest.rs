use std::{collections::HashSet, time::SystemTime};

use uuid::Uuid;

use crate::{dao::models::QuestionEntity, services::scoring::ScoreOutcome};

/// Identifier assigned to every attached WebSocket.
pub type ConnectionId = Uuid;

/// Single-correct-answer multiple choice question, immutable for the room lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Problem-set identifier.
    pub id: String,
    /// Prompt shown to players.
    pub text: String,
    /// Options in display order.
    pub options: Vec<String>,
    /// Option text that counts as correct.
    pub correct_answer: String,
    /// Maximum points awarded for an instant correct answer.
    pub points: u32,
    /// Time allowed to answer, in seconds.
    pub time_allocation_seconds: u32,
}

impl Question {
    /// Allocation expressed in milliseconds.
    pub fn time_allocation_ms(&self) -> u64 {
        u64::from(self.time_allocation_seconds) * 1_000
    }
}

impl TryFrom<QuestionEntity> for Question {
    type Error = String;

    fn try_from(value: QuestionEntity) -> Result<Self, Self::Error> {
        let QuestionEntity {
            id,
            question,
            question_text,
            options,
            correct_answer,
            points,
            time_allocation_seconds,
            ..
        } = value;

        let text = question_text
            .or(question)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| format!("question `{id}` has no text"))?;

        if options.is_empty() {
            return Err(format!("question `{id}` has no options"));
        }

        if !options.iter().any(|option| option == &correct_answer) {
            return Err(format!(
                "question `{id}` correct answer is not one of its options"
            ));
        }

        if time_allocation_seconds == 0 {
            return Err(format!("question `{id}` has a zero time allocation"));
        }

        Ok(Self {
            id,
            text,
            options,
            correct_answer,
            points,
            time_allocation_seconds,
        })
    }
}

/// Player tracked by a room. Identity is `user_id`; `username` is display only.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Stable user identifier taken from the verified token.
    pub user_id: String,
    /// Display name.
    pub username: String,
    score: u32,
    time_spent_ms: u64,
    connections: HashSet<ConnectionId>,
    answered_question_ids: HashSet<String>,
}

impl Participant {
    /// Create a participant with a zero score and no attached socket.
    pub fn new(user_id: String, username: String) -> Self {
        Self {
            user_id,
            username,
            score: 0,
            time_spent_ms: 0,
            connections: HashSet::new(),
            answered_question_ids: HashSet::new(),
        }
    }

    /// Current score.
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Accumulated answer time over every accepted submission.
    pub fn time_spent_ms(&self) -> u64 {
        self.time_spent_ms
    }

    /// True while at least one socket is attached.
    pub fn connected(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Whether an answer for `question_id` was already accepted.
    pub fn has_answered(&self, question_id: &str) -> bool {
        self.answered_question_ids.contains(question_id)
    }

    pub(crate) fn attach(&mut self, connection: ConnectionId) -> bool {
        self.connections.insert(connection)
    }

    pub(crate) fn detach(&mut self, connection: ConnectionId) -> bool {
        self.connections.remove(&connection)
    }

    /// Fold a scorer outcome into the participant. Scores only ever grow.
    pub(crate) fn record(&mut self, question_id: &str, outcome: &ScoreOutcome) {
        if !self.answered_question_ids.insert(question_id.to_string()) {
            return;
        }
        self.score = self.score.saturating_add(outcome.points_awarded);
        self.time_spent_ms = self.time_spent_ms.saturating_add(outcome.time_taken_ms);
    }
}

/// Accepted answer kept for the persisted record.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Submitting user.
    pub user_id: String,
    /// Question answered.
    pub question_id: String,
    /// Option text chosen by the user.
    pub selected_answer: String,
    /// Scorer verdict.
    pub is_correct: bool,
    /// Time between question broadcast and receipt.
    pub time_taken_ms: u64,
    /// Points granted by the scorer.
    pub points_awarded: u32,
    /// Wall-clock receipt time.
    pub submitted_at: SystemTime,
}

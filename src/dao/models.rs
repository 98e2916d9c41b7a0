use serde::{Deserialize, Serialize};

fn default_points() -> u32 {
    10
}

fn default_time_allocation() -> u32 {
    60
}

fn default_active() -> bool {
    true
}

/// Problem-set row as exposed by the question bank (file or HTTP).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEntity {
    /// Stable problem-set identifier.
    pub id: String,
    /// Prompt (legacy column).
    #[serde(default)]
    pub question: Option<String>,
    /// Prompt (current column), preferred over `question`.
    #[serde(default)]
    pub question_text: Option<String>,
    /// Options in display order.
    pub options: Vec<String>,
    /// Option text that counts as correct.
    pub correct_answer: String,
    /// Maximum points for the question.
    #[serde(default = "default_points")]
    pub points: u32,
    /// Seconds allowed to answer.
    #[serde(default = "default_time_allocation")]
    pub time_allocation_seconds: u32,
    /// Difficulty bucket (`easy`, `medium`, `hard`).
    #[serde(default)]
    pub difficulty: Option<String>,
    /// Inactive questions are never picked by random selection.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Body sent to the HTTP question bank.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionQueryEntity {
    pub contest_id: String,
    pub difficulty: String,
    pub question_count: usize,
    pub selected_question_ids: Vec<String>,
}

/// Envelope returned by the HTTP question bank.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionBatchEntity {
    pub questions: Vec<QuestionEntity>,
}

/// Bulk payload accepted by the save-results endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaveResultsEntity {
    pub contest_id: String,
    pub contest_status: String,
    pub questions: Vec<ContestQuestionEntity>,
    pub results: Vec<ContestResultEntity>,
    pub answers: Vec<PlayerAnswerEntity>,
    pub submissions: Vec<ContestSubmissionEntity>,
}

/// Question membership and order within the contest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContestQuestionEntity {
    pub problem_set_id: String,
    pub order_index: usize,
}

/// Final ranking row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContestResultEntity {
    pub user_id: String,
    pub username: String,
    pub score: u32,
    pub rank: usize,
    /// Seconds spent answering across the contest.
    pub time_spent: u64,
}

/// Per-answer detail row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAnswerEntity {
    pub user_id: String,
    pub question_id: String,
    pub answer: String,
    pub is_correct: bool,
    /// Milliseconds.
    pub time_taken: u64,
    pub points_awarded: u32,
    pub answered_at: String,
}

/// Submission row as stored by the contest submission table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContestSubmissionEntity {
    pub user_id: String,
    pub question_id: String,
    pub problem_set_id: String,
    pub answer: String,
    pub selected_answer: String,
    pub is_correct: bool,
    pub points_earned: u32,
    pub time_spent_seconds: u64,
    pub submitted_at: String,
}

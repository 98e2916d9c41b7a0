mod file;
mod http;

use futures::future::BoxFuture;

use crate::dao::{models::QuestionEntity, storage::StorageResult};

pub use file::FileQuestionSource;
pub use http::HttpQuestionSource;

/// Selection criteria for the questions of one contest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionQuery {
    /// Contest the questions are loaded for.
    pub contest_id: String,
    /// Difficulty bucket, `None` accepts every difficulty.
    pub difficulty: Option<String>,
    /// Number of questions wanted when no explicit selection is given.
    pub question_count: usize,
    /// Explicit, ordered selection. Takes precedence over random picking.
    pub selected_question_ids: Vec<String>,
}

/// Abstraction over the question bank consulted once at room creation.
pub trait QuestionSource: Send + Sync {
    /// Fetch the ordered question set for a contest.
    fn load(&self, query: QuestionQuery) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    /// Short label for logs.
    fn describe(&self) -> String;
}

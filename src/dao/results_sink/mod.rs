mod http;

use futures::future::BoxFuture;
use tracing::info;

use crate::dao::{models::SaveResultsEntity, storage::StorageResult};

pub use http::HttpResultsSink;

/// How the receiving side acknowledged a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Rows were written.
    Saved,
    /// The receiver already had this contest; treated as success.
    AlreadySaved,
}

/// Durable destination for finished contest results.
pub trait ResultsSink: Send + Sync {
    /// Hand over the bulk payload for one contest.
    fn save(&self, payload: SaveResultsEntity) -> BoxFuture<'static, StorageResult<SaveOutcome>>;
    /// Short label for logs.
    fn describe(&self) -> String;
}

/// Sink used when no save-results endpoint is configured: results are only logged.
#[derive(Debug, Clone, Default)]
pub struct LogResultsSink;

impl ResultsSink for LogResultsSink {
    fn save(&self, payload: SaveResultsEntity) -> BoxFuture<'static, StorageResult<SaveOutcome>> {
        info!(
            contest_id = %payload.contest_id,
            results = payload.results.len(),
            answers = payload.answers.len(),
            "no results endpoint configured; contest results kept in logs only"
        );
        Box::pin(async { Ok(SaveOutcome::Saved) })
    }

    fn describe(&self) -> String {
        "log".into()
    }
}

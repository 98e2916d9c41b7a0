//! Once-per-contest hand-off of final results to the durable store.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    dao::{
        models::{
            ContestQuestionEntity, ContestResultEntity, ContestSubmissionEntity,
            PlayerAnswerEntity, SaveResultsEntity,
        },
        results_sink::{ResultsSink, SaveOutcome},
        storage::StorageError,
    },
    dto::format_system_time,
    state::{metrics::Metrics, room::ContestOutcome, state_machine::ContestStatus},
};

/// Bounded exponential backoff for the save call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub attempts: u32,
    /// Delay after the first failure.
    pub initial_backoff: Duration,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Save-results failure after the policy gave up.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The receiver refused the payload; retrying would not help.
    #[error("results for contest `{contest_id}` rejected")]
    Rejected {
        contest_id: String,
        #[source]
        source: StorageError,
    },
    /// Every attempt failed with a transient error.
    #[error("gave up saving contest `{contest_id}` after {attempts} attempts")]
    Exhausted {
        contest_id: String,
        attempts: u32,
        #[source]
        source: StorageError,
    },
}

/// Retrying front for a [`ResultsSink`].
#[derive(Clone)]
pub struct PersistenceGateway {
    sink: Arc<dyn ResultsSink>,
    policy: RetryPolicy,
    metrics: Arc<Metrics>,
}

impl PersistenceGateway {
    /// Wrap `sink` with `policy`, reporting outcomes into `metrics`.
    pub fn new(sink: Arc<dyn ResultsSink>, policy: RetryPolicy, metrics: Arc<Metrics>) -> Self {
        Self {
            sink,
            policy,
            metrics,
        }
    }

    /// Label of the underlying sink.
    pub fn describe(&self) -> String {
        self.sink.describe()
    }

    /// Persist a finished contest. Transient failures are retried; anything
    /// else is returned immediately.
    pub async fn save_results(&self, outcome: &ContestOutcome) -> Result<SaveOutcome, PersistError> {
        let payload = build_payload(outcome);
        let contest_id = outcome.contest_id.clone();
        let mut delay = self.policy.initial_backoff;
        let mut attempt = 1;

        loop {
            match self.sink.save(payload.clone()).await {
                Ok(saved) => {
                    self.metrics.persistence_succeeded();
                    info!(
                        contest_id = %contest_id,
                        attempt,
                        outcome = ?saved,
                        sink = %self.sink.describe(),
                        "contest results persisted"
                    );
                    return Ok(saved);
                }
                Err(err) if err.is_transient() && attempt < self.policy.attempts => {
                    warn!(
                        contest_id = %contest_id,
                        attempt,
                        error = %err,
                        "saving contest results failed; retrying"
                    );
                    self.metrics.persistence_retried();
                    sleep(delay).await;
                    delay = (delay * 2).min(self.policy.max_backoff);
                    attempt += 1;
                }
                Err(err) if err.is_transient() => {
                    self.metrics.persistence_failed();
                    error!(
                        contest_id = %contest_id,
                        attempt,
                        error = %err,
                        "exhausted save attempts; results only kept in memory"
                    );
                    return Err(PersistError::Exhausted {
                        contest_id,
                        attempts: attempt,
                        source: err,
                    });
                }
                Err(err) => {
                    self.metrics.persistence_failed();
                    error!(
                        contest_id = %contest_id,
                        error = %err,
                        "save-results endpoint rejected contest results"
                    );
                    return Err(PersistError::Rejected {
                        contest_id,
                        source: err,
                    });
                }
            }
        }
    }
}

fn millis_to_seconds(ms: u64) -> u64 {
    (ms + 500) / 1_000
}

/// Assemble the bulk save-results payload.
pub fn build_payload(outcome: &ContestOutcome) -> SaveResultsEntity {
    let questions = outcome
        .questions
        .iter()
        .enumerate()
        .map(|(order_index, question)| ContestQuestionEntity {
            problem_set_id: question.id.clone(),
            order_index,
        })
        .collect();

    let results = outcome
        .standings
        .iter()
        .map(|row| ContestResultEntity {
            user_id: row.user_id.clone(),
            username: row.username.clone(),
            score: row.score,
            rank: row.rank,
            time_spent: millis_to_seconds(row.time_spent_ms),
        })
        .collect();

    let answers = outcome
        .submissions
        .iter()
        .map(|submission| PlayerAnswerEntity {
            user_id: submission.user_id.clone(),
            question_id: submission.question_id.clone(),
            answer: submission.selected_answer.clone(),
            is_correct: submission.is_correct,
            time_taken: submission.time_taken_ms,
            points_awarded: submission.points_awarded,
            answered_at: format_system_time(submission.submitted_at),
        })
        .collect();

    let submissions = outcome
        .submissions
        .iter()
        .map(|submission| ContestSubmissionEntity {
            user_id: submission.user_id.clone(),
            question_id: submission.question_id.clone(),
            problem_set_id: submission.question_id.clone(),
            answer: submission.selected_answer.clone(),
            selected_answer: submission.selected_answer.clone(),
            is_correct: submission.is_correct,
            points_earned: submission.points_awarded,
            time_spent_seconds: millis_to_seconds(submission.time_taken_ms),
            submitted_at: format_system_time(submission.submitted_at),
        })
        .collect();

    SaveResultsEntity {
        contest_id: outcome.contest_id.clone(),
        contest_status: ContestStatus::Finished.as_str().to_string(),
        questions,
        results,
        answers,
        submissions,
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::UNIX_EPOCH};

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        dao::storage::StorageResult,
        dto::ws::FinalStanding,
        state::contest::{Question, Submission},
    };

    /// Sink replaying scripted results, recording every payload it sees.
    struct ScriptedSink {
        script: Mutex<Vec<StorageResult<SaveOutcome>>>,
        seen: Mutex<Vec<SaveResultsEntity>>,
    }

    impl ScriptedSink {
        fn new(mut script: Vec<StorageResult<SaveOutcome>>) -> Arc<Self> {
            script.reverse();
            Arc::new(Self {
                script: Mutex::new(script),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    impl ResultsSink for ScriptedSink {
        fn save(&self, payload: SaveResultsEntity) -> BoxFuture<'static, StorageResult<SaveOutcome>> {
            self.seen.lock().unwrap().push(payload);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Ok(SaveOutcome::Saved));
            Box::pin(async move { next })
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    fn status(code: u16) -> StorageError {
        StorageError::Status {
            endpoint: "save".into(),
            status: code,
        }
    }

    fn outcome() -> ContestOutcome {
        let question = Question {
            id: "q1".into(),
            text: "2 + 2?".into(),
            options: vec!["3".into(), "4".into()],
            correct_answer: "4".into(),
            points: 10,
            time_allocation_seconds: 30,
        };
        ContestOutcome {
            contest_id: "c1".into(),
            questions: Arc::from(vec![question]),
            standings: vec![FinalStanding {
                user_id: "u1".into(),
                username: "Ada".into(),
                score: 8,
                rank: 1,
                time_spent_ms: 5_000,
            }],
            submissions: vec![Submission {
                user_id: "u1".into(),
                question_id: "q1".into(),
                selected_answer: "4".into(),
                is_correct: true,
                time_taken_ms: 5_000,
                points_awarded: 8,
                submitted_at: UNIX_EPOCH,
            }],
        }
    }

    fn gateway(sink: Arc<ScriptedSink>) -> (PersistenceGateway, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::default());
        let gateway = PersistenceGateway::new(sink, RetryPolicy::default(), metrics.clone());
        (gateway, metrics)
    }

    #[test]
    fn payload_matches_save_results_shape() {
        let payload = build_payload(&outcome());
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["contestId"], "c1");
        assert_eq!(value["contestStatus"], "finished");
        assert_eq!(value["questions"][0]["problemSetId"], "q1");
        assert_eq!(value["questions"][0]["orderIndex"], 0);
        assert_eq!(value["results"][0]["timeSpent"], 5);
        assert_eq!(value["answers"][0]["timeTaken"], 5_000);
        assert_eq!(value["answers"][0]["answeredAt"], "1970-01-01T00:00:00Z");
        assert_eq!(value["submissions"][0]["pointsEarned"], 8);
        assert_eq!(value["submissions"][0]["timeSpentSeconds"], 5);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_until_success() {
        let sink = ScriptedSink::new(vec![Err(status(503)), Err(status(502))]);
        let (gateway, metrics) = gateway(sink.clone());

        let saved = gateway.save_results(&outcome()).await.unwrap();

        assert_eq!(saved, SaveOutcome::Saved);
        assert_eq!(sink.calls(), 3);
        let snapshot = metrics.snapshot(0);
        assert_eq!(snapshot.persistence_retried, 2);
        assert_eq!(snapshot.persistence_succeeded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_is_reported_after_bounded_attempts() {
        let sink = ScriptedSink::new(vec![Err(status(500)), Err(status(500)), Err(status(500))]);
        let (gateway, metrics) = gateway(sink.clone());

        let err = gateway.save_results(&outcome()).await.unwrap_err();

        assert!(matches!(err, PersistError::Exhausted { attempts: 3, .. }));
        assert_eq!(sink.calls(), 3);
        assert_eq!(metrics.snapshot(0).persistence_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let sink = ScriptedSink::new(vec![Err(status(400))]);
        let (gateway, _) = gateway(sink.clone());

        let err = gateway.save_results(&outcome()).await.unwrap_err();

        assert!(matches!(err, PersistError::Rejected { .. }));
        assert_eq!(sink.calls(), 1);
    }

    #[tokio::test]
    async fn already_saved_counts_as_success() {
        let sink = ScriptedSink::new(vec![Ok(SaveOutcome::AlreadySaved)]);
        let (gateway, metrics) = gateway(sink);

        let saved = gateway.save_results(&outcome()).await.unwrap();
        assert_eq!(saved, SaveOutcome::AlreadySaved);
        assert_eq!(metrics.snapshot(0).persistence_succeeded, 1);
    }
}

use std::{fs, path::Path, sync::Arc};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use rand::{rng, seq::SliceRandom};

use crate::dao::{
    models::QuestionEntity,
    storage::{StorageError, StorageResult},
};

use super::{QuestionQuery, QuestionSource};

/// Question bank held in memory, typically read from a JSON problem-set export.
#[derive(Clone)]
pub struct FileQuestionSource {
    label: Arc<str>,
    questions: Arc<IndexMap<String, QuestionEntity>>,
}

impl FileQuestionSource {
    /// Read a JSON array of problem-set rows from disk.
    pub fn from_path(path: &Path) -> StorageResult<Self> {
        let contents = fs::read_to_string(path).map_err(|source| {
            StorageError::unavailable(format!("failed to read `{}`", path.display()), source)
        })?;
        let entities = serde_json::from_str::<Vec<QuestionEntity>>(&contents).map_err(|err| {
            StorageError::InvalidPayload {
                endpoint: path.display().to_string(),
                message: err.to_string(),
            }
        })?;

        Ok(Self::new(path.display().to_string(), entities))
    }

    /// Wrap an already loaded set of rows. Later duplicates of an id win.
    pub fn new(label: impl Into<String>, entities: Vec<QuestionEntity>) -> Self {
        let questions = entities
            .into_iter()
            .map(|entity| (entity.id.clone(), entity))
            .collect::<IndexMap<_, _>>();

        Self {
            label: Arc::from(label.into().as_str()),
            questions: Arc::new(questions),
        }
    }

    /// Number of rows in the bank.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// True when the bank holds no rows.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    fn select(&self, query: &QuestionQuery) -> StorageResult<Vec<QuestionEntity>> {
        if !query.selected_question_ids.is_empty() {
            return query
                .selected_question_ids
                .iter()
                .map(|id| {
                    self.questions
                        .get(id)
                        .cloned()
                        .ok_or_else(|| StorageError::NotFound(format!("question `{id}`")))
                })
                .collect();
        }

        let mut pool = self
            .questions
            .values()
            .filter(|entity| entity.is_active)
            .filter(|entity| matches_difficulty(entity, query.difficulty.as_deref()))
            .cloned()
            .collect::<Vec<_>>();

        pool.shuffle(&mut rng());
        pool.truncate(query.question_count);
        Ok(pool)
    }
}

fn matches_difficulty(entity: &QuestionEntity, wanted: Option<&str>) -> bool {
    match (wanted, entity.difficulty.as_deref()) {
        (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
        _ => true,
    }
}

impl QuestionSource for FileQuestionSource {
    fn load(&self, query: QuestionQuery) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let result = self.select(&query);
        Box::pin(async move { result })
    }

    fn describe(&self) -> String {
        format!("file:{}", self.label)
    }
}

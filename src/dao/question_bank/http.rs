use futures::future::BoxFuture;
use reqwest::Method;

use crate::dao::{
    http::{HttpEndpoint, HttpEndpointConfig},
    models::{QuestionBatchEntity, QuestionEntity, QuestionQueryEntity},
    storage::{StorageError, StorageResult},
};

use super::{QuestionQuery, QuestionSource};

/// Question bank served by the web application over HTTP.
#[derive(Clone)]
pub struct HttpQuestionSource {
    endpoint: HttpEndpoint,
}

impl HttpQuestionSource {
    /// Bind the source to the configured endpoint.
    pub fn new(config: HttpEndpointConfig) -> StorageResult<Self> {
        Ok(Self {
            endpoint: HttpEndpoint::new(config)?,
        })
    }

    async fn fetch(self, query: QuestionQuery) -> StorageResult<Vec<QuestionEntity>> {
        let url = self.endpoint.url().to_string();
        let body = QuestionQueryEntity {
            contest_id: query.contest_id,
            difficulty: query.difficulty.unwrap_or_default(),
            question_count: query.question_count,
            selected_question_ids: query.selected_question_ids,
        };

        let response = self
            .endpoint
            .request(Method::POST)
            .json(&body)
            .send()
            .await
            .map_err(|source| {
                StorageError::unavailable(format!("failed to reach `{url}`"), source)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status {
                endpoint: url,
                status: status.as_u16(),
            });
        }

        let batch = response
            .json::<QuestionBatchEntity>()
            .await
            .map_err(|err| StorageError::InvalidPayload {
                endpoint: url,
                message: err.to_string(),
            })?;

        Ok(batch.questions)
    }
}

impl QuestionSource for HttpQuestionSource {
    fn load(&self, query: QuestionQuery) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let source = self.clone();
        Box::pin(source.fetch(query))
    }

    fn describe(&self) -> String {
        format!("http:{}", self.endpoint.url())
    }
}

use futures::future::BoxFuture;
use reqwest::{Method, StatusCode};

use crate::dao::{
    http::{HttpEndpoint, HttpEndpointConfig},
    models::SaveResultsEntity,
    storage::{StorageError, StorageResult},
};

use super::{ResultsSink, SaveOutcome};

/// Posts results to the web application's save-results route.
#[derive(Clone)]
pub struct HttpResultsSink {
    endpoint: HttpEndpoint,
}

impl HttpResultsSink {
    /// Bind the sink to the configured endpoint.
    pub fn new(config: HttpEndpointConfig) -> StorageResult<Self> {
        Ok(Self {
            endpoint: HttpEndpoint::new(config)?,
        })
    }

    async fn post(self, payload: SaveResultsEntity) -> StorageResult<SaveOutcome> {
        let url = self.endpoint.url().to_string();
        let response = self
            .endpoint
            .request(Method::POST)
            .json(&payload)
            .send()
            .await
            .map_err(|source| {
                StorageError::unavailable(format!("failed to reach `{url}`"), source)
            })?;

        match response.status() {
            status if status.is_success() => Ok(SaveOutcome::Saved),
            StatusCode::CONFLICT => Ok(SaveOutcome::AlreadySaved),
            other => Err(StorageError::Status {
                endpoint: url,
                status: other.as_u16(),
            }),
        }
    }
}

impl ResultsSink for HttpResultsSink {
    fn save(&self, payload: SaveResultsEntity) -> BoxFuture<'static, StorageResult<SaveOutcome>> {
        let sink = self.clone();
        Box::pin(sink.post(payload))
    }

    fn describe(&self) -> String {
        format!("http:{}", self.endpoint.url())
    }
}

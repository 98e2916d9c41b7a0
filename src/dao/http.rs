//! Shared reqwest plumbing for the external HTTP collaborators.

use std::{sync::Arc, time::Duration};

use reqwest::{Client, Method, RequestBuilder};

use crate::dao::storage::{StorageError, StorageResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to reach an external JSON endpoint.
#[derive(Debug, Clone)]
pub struct HttpEndpointConfig {
    /// Absolute URL of the endpoint.
    pub url: String,
    /// Optional bearer token sent as `Authorization`.
    pub bearer_token: Option<String>,
}

impl HttpEndpointConfig {
    /// Endpoint without authentication.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer_token: None,
        }
    }

    /// Attach a bearer token to every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

/// Cheaply cloneable client bound to a single endpoint.
#[derive(Clone)]
pub struct HttpEndpoint {
    client: Client,
    url: Arc<str>,
    bearer_token: Option<Arc<str>>,
}

impl HttpEndpoint {
    /// Build the underlying reqwest client.
    pub fn new(config: HttpEndpointConfig) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| {
                StorageError::unavailable("failed to build HTTP client".into(), source)
            })?;

        Ok(Self {
            client,
            url: Arc::from(config.url.as_str()),
            bearer_token: config.bearer_token.map(|token| Arc::from(token.as_str())),
        })
    }

    /// Endpoint URL, used in log lines and errors.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn request(&self, method: Method) -> RequestBuilder {
        let builder = self.client.request(method, self.url.as_ref());
        match self.bearer_token {
            Some(ref token) => builder.bearer_auth(token.as_ref()),
            None => builder,
        }
    }
}

use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use study_core::model::{Card, CardId, Category};

use super::{
    ApiError, CardQuery, CategoryQuery, GENERIC_FAILURE, StudyAck, StudyApi, StudyOutcomeBody,
};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the remote card store.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiConfigError {
    #[error("STUDY_API_URL is not set")]
    MissingBaseUrl,
    #[error("invalid STUDY_API_TIMEOUT_SECS value: {raw}")]
    InvalidTimeout { raw: String },
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

impl ApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Read `STUDY_API_URL`, `STUDY_API_TOKEN` and `STUDY_API_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `ApiConfigError::MissingBaseUrl` when no URL is configured and
    /// `ApiConfigError::InvalidTimeout` when the timeout is not a number.
    pub fn from_env() -> Result<Self, ApiConfigError> {
        let base_url = env::var("STUDY_API_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(ApiConfigError::MissingBaseUrl)?;
        let token = env::var("STUDY_API_TOKEN")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let timeout = match env::var("STUDY_API_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ApiConfigError::InvalidTimeout { raw })?,
            Err(_) => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };
        Ok(Self {
            base_url,
            token,
            timeout,
        })
    }
}

/// Supplies the bearer credential for each request.
///
/// Owned by the identity layer; the study engine only reads it.
pub trait CredentialSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// A credential fixed at construction time.
#[derive(Clone, Debug, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self(token)
    }
}

impl CredentialSource for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// `StudyApi` over HTTPS + JSON.
#[derive(Clone)]
pub struct HttpStudyApi {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialSource>,
}

impl HttpStudyApi {
    /// Build a client using the token from `config`.
    ///
    /// # Errors
    ///
    /// Returns `ApiConfigError::Client` if the TLS backend cannot be initialized.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiConfigError> {
        Self::with_credentials(config, Arc::new(StaticToken::new(config.token.clone())))
    }

    /// Build a client that asks `credentials` for a token on every request.
    ///
    /// # Errors
    ///
    /// Returns `ApiConfigError::Client` if the TLS backend cannot be initialized.
    pub fn with_credentials(
        config: &ApiConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, ApiConfigError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn bearer(&self) -> Result<String, ApiError> {
        self.credentials
            .bearer_token()
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::AuthenticationRequired)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let token = self.bearer()?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let message = failure_message(&body);
            warn!(%status, %message, "remote request failed");
            return Err(ApiError::RequestFailed(message));
        }

        response.json::<T>().await.map_err(transport_error)
    }
}

#[async_trait]
impl StudyApi for HttpStudyApi {
    async fn list_categories(&self, query: &CategoryQuery) -> Result<Vec<Category>, ApiError> {
        debug!(?query, "listing categories");
        let request = self.client.get(self.url("/categories/")).query(query);
        self.send(request).await
    }

    async fn list_cards(&self, query: &CardQuery) -> Result<Vec<Card>, ApiError> {
        debug!(?query, "listing cards");
        let request = self.client.get(self.url("/cards/")).query(query);
        self.send(request).await
    }

    async fn record_study(&self, card_id: CardId, success: bool) -> Result<StudyAck, ApiError> {
        debug!(%card_id, success, "recording study outcome");
        let request = self
            .client
            .post(self.url(&format!("/cards/{card_id}/study")))
            .json(&StudyOutcomeBody { success });
        self.send(request).await
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    ApiError::RequestFailed(err.to_string())
}

/// Extract the server's `detail` message from an error body.
fn failure_message(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        })
        .filter(|detail| !detail.trim().is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE.to_owned())
}

//! Remote card store contract.
//!
//! `StudyApi` is the seam between the study engine and the server. The HTTP
//! implementation talks to the real backend; the in-memory implementation
//! backs tests and local prototyping.

mod http;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use study_core::model::{Card, CardId, Category, CategoryId};

pub use http::{ApiConfig, ApiConfigError, CredentialSource, HttpStudyApi, StaticToken};
pub use memory::{InMemoryStudyApi, RecordedStudy};

/// Fallback message when the server gives no usable error detail.
pub const GENERIC_FAILURE: &str = "Request failed";

/// Errors surfaced by remote store adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ApiError {
    #[error("authentication required")]
    AuthenticationRequired,

    #[error("{0}")]
    RequestFailed(String),
}

/// Query parameters for `GET /cards/`. Unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CardQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl CardQuery {
    #[must_use]
    pub fn category(category_id: CategoryId, limit: u32) -> Self {
        Self {
            category_id: Some(category_id),
            limit: Some(limit),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn tag(tag: impl Into<String>, limit: u32) -> Self {
        Self {
            tag: Some(tag.into()),
            limit: Some(limit),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn due(limit: u32) -> Self {
        Self {
            study: Some(true),
            limit: Some(limit),
            ..Self::default()
        }
    }
}

/// Query parameters for `GET /categories/`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Acknowledgement returned by `POST /cards/{id}/study`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyAck {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudyOutcomeBody {
    pub success: bool,
}

/// Remote card store contract.
#[async_trait]
pub trait StudyApi: Send + Sync {
    /// List categories visible to the signed-in identity.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::AuthenticationRequired` without a credential, or
    /// `ApiError::RequestFailed` for any failed request.
    async fn list_categories(&self, query: &CategoryQuery) -> Result<Vec<Category>, ApiError>;

    /// List cards matching the query, in server order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::AuthenticationRequired` without a credential, or
    /// `ApiError::RequestFailed` for any failed request.
    async fn list_cards(&self, query: &CardQuery) -> Result<Vec<Card>, ApiError>;

    /// Record one study outcome for a card.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::AuthenticationRequired` without a credential, or
    /// `ApiError::RequestFailed` for any failed request.
    async fn record_study(&self, card_id: CardId, success: bool) -> Result<StudyAck, ApiError>;
}

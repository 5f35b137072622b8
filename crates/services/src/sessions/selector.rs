use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use study_core::model::{Card, CategoryId, TagName};
use study_storage::remote::CardQuery;
use study_storage::{ApiError, StudyApi};

use crate::config::SessionConfig;

/// Which cards a session studies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFilter {
    Category(CategoryId),
    Tag(TagName),
    /// Cards the server considers due. `None` uses the configured limit.
    Due { limit: Option<u32> },
}

impl fmt::Display for SessionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionFilter::Category(id) => write!(f, "category {id}"),
            SessionFilter::Tag(tag) => write!(f, "tag {tag}"),
            SessionFilter::Due { .. } => write!(f, "due cards"),
        }
    }
}

/// Fetches the ordered card set for a session.
///
/// Always asks the remote store; the cached collection is never used here
/// since it may lag behind answers given in an earlier session.
#[derive(Clone)]
pub struct SessionSelector {
    api: Arc<dyn StudyApi>,
    config: SessionConfig,
}

impl SessionSelector {
    #[must_use]
    pub fn new(api: Arc<dyn StudyApi>, config: SessionConfig) -> Self {
        Self { api, config }
    }

    /// # Errors
    ///
    /// Propagates `ApiError` from the remote store. An empty list is not an error.
    pub async fn select(&self, filter: &SessionFilter) -> Result<Vec<Card>, ApiError> {
        match filter {
            SessionFilter::Category(id) => self.select_for_category(*id).await,
            SessionFilter::Tag(tag) => self.select_for_tag(tag).await,
            SessionFilter::Due { limit } => {
                self.select_due(limit.unwrap_or(self.config.due_limit)).await
            }
        }
    }

    /// # Errors
    ///
    /// Propagates `ApiError` from the remote store.
    pub async fn select_for_category(&self, category_id: CategoryId) -> Result<Vec<Card>, ApiError> {
        self.fetch(CardQuery::category(category_id, self.config.page_size))
            .await
    }

    /// # Errors
    ///
    /// Propagates `ApiError` from the remote store.
    pub async fn select_for_tag(&self, tag: &TagName) -> Result<Vec<Card>, ApiError> {
        self.fetch(CardQuery::tag(tag.as_str(), self.config.page_size))
            .await
    }

    /// # Errors
    ///
    /// Propagates `ApiError` from the remote store.
    pub async fn select_due(&self, limit: u32) -> Result<Vec<Card>, ApiError> {
        self.fetch(CardQuery::due(limit)).await
    }

    async fn fetch(&self, query: CardQuery) -> Result<Vec<Card>, ApiError> {
        let cards = self.api.list_cards(&query).await?;
        debug!(?query, selected = cards.len(), "selected session cards");
        Ok(cards)
    }
}

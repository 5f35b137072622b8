use std::sync::Arc;

use study_core::aggregate::{study_totals, summarize_categories, summarize_tags};
use study_core::model::{Card, CardId, CategorySummary, StudyTotals, TagSummary};
use study_storage::CardStore;

/// Read-only progress view over the `CardStore`.
///
/// Each call aggregates the store's current snapshot; nothing is cached, so
/// results always reflect the latest completed refresh.
#[derive(Clone)]
pub struct StudyOverview {
    store: Arc<CardStore>,
}

impl StudyOverview {
    #[must_use]
    pub fn new(store: Arc<CardStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn categories(&self) -> Vec<CategorySummary> {
        let snapshot = self.store.snapshot();
        summarize_categories(&snapshot.cards, &snapshot.categories)
    }

    #[must_use]
    pub fn tags(&self) -> Vec<TagSummary> {
        summarize_tags(&self.store.snapshot().cards)
    }

    #[must_use]
    pub fn totals(&self) -> StudyTotals {
        study_totals(&self.store.snapshot().cards)
    }

    /// Look up a cached card by id.
    #[must_use]
    pub fn card(&self, id: CardId) -> Option<Card> {
        self.store.snapshot().card(id).cloned()
    }
}

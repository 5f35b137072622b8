use serde::Serialize;

use crate::model::category::Category;

/// Progress for one category, derived from the current card collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    #[serde(flatten)]
    pub category: Category,
    pub card_count: usize,
    pub studied_count: usize,
}

/// Progress for one tag. A card with N distinct tags feeds N summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagSummary {
    pub name: String,
    pub card_count: usize,
    pub studied_count: usize,
}

/// Collection-wide counters shown on the overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StudyTotals {
    pub total_cards: usize,
    pub studied_cards: usize,
}

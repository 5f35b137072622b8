use chrono::{DateTime, Utc};
use serde::Serialize;

use super::selector::SessionFilter;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

/// Tally of one pass through a session's cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub filter: SessionFilter,
    pub total: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionReport {
    #[must_use]
    pub fn answered(&self) -> usize {
        self.correct + self.incorrect
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CardId, CategoryId};
use crate::time::serde_timestamp;

//
// ─── CARD ──────────────────────────────────────────────────────────────────────
//

/// A flashcard as returned by the remote card collection.
///
/// Cards are never patched locally: every successful fetch replaces them
/// wholesale, so `study_count` only moves when the server says so.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub front: String,
    pub back: String,
    pub category_id: CategoryId,
    /// Raw tag list. Semantically a set; duplicates are tolerated on decode.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub study_count: u32,
    /// Advisory due date computed by the server.
    #[serde(default, with = "serde_timestamp::option")]
    pub next_study: Option<DateTime<Utc>>,
    #[serde(with = "serde_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Card {
    /// Whether the card carries `tag` (exact, case-sensitive match).
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// A card counts as studied once the server has recorded at least one outcome.
    #[must_use]
    pub fn is_studied(&self) -> bool {
        self.study_count > 0
    }

    /// The side shown to the learner: `front` until flipped, then `back`.
    #[must_use]
    pub fn text(&self, flipped: bool) -> &str {
        if flipped { &self.back } else { &self.front }
    }

    /// Tags with duplicates removed, in first-seen order.
    pub fn distinct_tags(&self) -> impl Iterator<Item = &str> {
        self.tags
            .iter()
            .enumerate()
            .filter(|(i, tag)| !self.tags[..*i].contains(*tag))
            .map(|(_, tag)| tag.as_str())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

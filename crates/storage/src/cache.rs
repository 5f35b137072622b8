//! In-memory cache of the last fetched collections.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use study_core::model::{Card, CardId, Category};

/// Immutable view of the card and category collections at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub cards: Vec<Card>,
    pub categories: Vec<Category>,
    /// `None` until the first successful fetch.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl StoreSnapshot {
    #[must_use]
    pub fn new(cards: Vec<Card>, categories: Vec<Category>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            cards,
            categories,
            fetched_at: Some(fetched_at),
        }
    }

    /// Look up a card in the cached collection without a remote call.
    #[must_use]
    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.iter().find(|card| card.id == id)
    }
}

/// Shared cache for one signed-in identity.
///
/// Readers take an `Arc` to the current snapshot; writers swap in a whole new
/// one. A reader therefore never sees a half-replaced collection.
#[derive(Debug, Default)]
pub struct CardStore {
    current: RwLock<Arc<StoreSnapshot>>,
}

impl CardStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Replace the cached collections in a single swap.
    pub fn replace(&self, next: StoreSnapshot) {
        let next = Arc::new(next);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.snapshot().fetched_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::model::CategoryId;
    use study_core::time::fixed_now;

    fn card(id: u64) -> Card {
        Card {
            id: CardId::new(id),
            front: "Q".into(),
            back: "A".into(),
            category_id: CategoryId::new(1),
            tags: Vec::new(),
            study_count: 0,
            next_study: None,
            created_at: fixed_now(),
        }
    }

    #[test]
    fn starts_empty_and_unloaded() {
        let store = CardStore::new();
        assert!(!store.is_loaded());
        assert!(store.snapshot().cards.is_empty());
    }

    #[test]
    fn replace_does_not_disturb_held_snapshots() {
        let store = CardStore::new();
        store.replace(StoreSnapshot::new(vec![card(1)], Vec::new(), fixed_now()));
        let before = store.snapshot();

        store.replace(StoreSnapshot::new(vec![card(1), card(2)], Vec::new(), fixed_now()));

        assert_eq!(before.cards.len(), 1);
        assert_eq!(store.snapshot().cards.len(), 2);
        assert!(store.is_loaded());
    }

    #[test]
    fn finds_card_by_id() {
        let snapshot = StoreSnapshot::new(vec![card(4), card(9)], Vec::new(), fixed_now());
        assert_eq!(snapshot.card(CardId::new(9)).map(|c| c.id), Some(CardId::new(9)));
        assert!(snapshot.card(CardId::new(5)).is_none());
    }

    #[test]
    fn concurrent_readers_see_whole_snapshots() {
        let store = Arc::new(CardStore::new());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for n in 1..=50_u64 {
                    let cards = (1..=n).map(card).collect();
                    store.replace(StoreSnapshot::new(cards, Vec::new(), fixed_now()));
                }
            })
        };

        for _ in 0..200 {
            let snapshot = store.snapshot();
            let ids: Vec<u64> = snapshot.cards.iter().map(|c| c.id.value()).collect();
            let expected: Vec<u64> = (1..=ids.len() as u64).collect();
            assert_eq!(ids, expected);
        }
        writer.join().unwrap();
    }
}

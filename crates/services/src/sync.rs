use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use study_core::Clock;
use study_storage::remote::{CardQuery, CategoryQuery};
use study_storage::{ApiError, CardStore, StoreSnapshot, StudyApi};

#[derive(Default)]
struct SyncStatus {
    in_flight: AtomicUsize,
    last_error: Mutex<Option<String>>,
    /// Ticket of the newest refresh that has been applied to the store.
    applied: Mutex<u64>,
    issued: Mutex<u64>,
}

/// Loads the full card and category collections into the `CardStore`.
///
/// This is the only writer of the store. Both the initial load and the
/// reconciliation after a recorded outcome go through `refresh`.
#[derive(Clone)]
pub struct StoreSync {
    clock: Clock,
    api: Arc<dyn StudyApi>,
    store: Arc<CardStore>,
    status: Arc<SyncStatus>,
}

struct LoadingGuard<'a>(&'a AtomicUsize);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl StoreSync {
    #[must_use]
    pub fn new(clock: Clock, api: Arc<dyn StudyApi>, store: Arc<CardStore>) -> Self {
        Self {
            clock,
            api,
            store,
            status: Arc::new(SyncStatus::default()),
        }
    }

    #[must_use]
    pub fn store(&self) -> Arc<CardStore> {
        Arc::clone(&self.store)
    }

    /// Fetch categories and cards together and swap them into the store.
    ///
    /// A refresh that completes after a newer one has already been applied
    /// is discarded, so the store never moves back to older data.
    ///
    /// # Errors
    ///
    /// Returns the first `ApiError` from either fetch. The store is left as it was.
    pub async fn refresh(&self) -> Result<Arc<StoreSnapshot>, ApiError> {
        self.status.in_flight.fetch_add(1, Ordering::AcqRel);
        let _loading = LoadingGuard(&self.status.in_flight);
        let ticket = {
            let mut issued = self.status.issued.lock().unwrap_or_else(PoisonError::into_inner);
            *issued += 1;
            *issued
        };
        self.set_last_error(None);

        let categories_query = CategoryQuery::default();
        let cards_query = CardQuery::default();
        let fetched = tokio::try_join!(
            self.api.list_categories(&categories_query),
            self.api.list_cards(&cards_query),
        );

        match fetched {
            Ok((categories, cards)) => {
                let mut applied = self.status.applied.lock().unwrap_or_else(PoisonError::into_inner);
                if ticket > *applied {
                    debug!(
                        cards = cards.len(),
                        categories = categories.len(),
                        "card store refreshed"
                    );
                    self.store
                        .replace(StoreSnapshot::new(cards, categories, self.clock.now()));
                    *applied = ticket;
                } else {
                    debug!(ticket, applied = *applied, "discarding stale refresh");
                }
                Ok(self.store.snapshot())
            }
            Err(err) => {
                warn!(error = %err, "card store refresh failed");
                self.set_last_error(Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Whether a refresh is currently running.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status.in_flight.load(Ordering::Acquire) > 0
    }

    /// Message of the most recent failed load or write, cleared when a new refresh starts.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.status
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_last_error(&self, message: Option<String>) {
        *self
            .status
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = message;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::model::{Card, CardId, Category, CategoryId};
    use study_core::time::{fixed_clock, fixed_now};
    use study_storage::remote::InMemoryStudyApi;

    fn seeded() -> InMemoryStudyApi {
        let api = InMemoryStudyApi::new(fixed_clock());
        api.upsert_category(Category {
            id: CategoryId::new(1),
            name: "Spanish".into(),
            description: None,
            priority: 0,
            created_at: fixed_now(),
            created_by: None,
        });
        api.upsert_card(Card {
            id: CardId::new(1),
            front: "hola".into(),
            back: "hello".into(),
            category_id: CategoryId::new(1),
            tags: Vec::new(),
            study_count: 0,
            next_study: None,
            created_at: fixed_now(),
        });
        api
    }

    #[tokio::test]
    async fn refresh_fills_the_store() {
        let api = seeded();
        let store = Arc::new(CardStore::new());
        let sync = StoreSync::new(fixed_clock(), Arc::new(api), Arc::clone(&store));

        let snapshot = sync.refresh().await.unwrap();

        assert_eq!(snapshot.cards.len(), 1);
        assert_eq!(snapshot.categories.len(), 1);
        assert_eq!(snapshot.fetched_at, Some(fixed_now()));
        assert!(store.is_loaded());
        assert!(!sync.is_loading());
        assert!(sync.last_error().is_none());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let api = seeded();
        let store = Arc::new(CardStore::new());
        let sync = StoreSync::new(fixed_clock(), Arc::new(api.clone()), Arc::clone(&store));
        sync.refresh().await.unwrap();

        api.upsert_card(Card {
            id: CardId::new(2),
            front: "adiós".into(),
            back: "bye".into(),
            category_id: CategoryId::new(1),
            tags: Vec::new(),
            study_count: 0,
            next_study: None,
            created_at: fixed_now(),
        });
        api.fail_next_list("maintenance");

        let err = sync.refresh().await.unwrap_err();

        assert_eq!(err, ApiError::RequestFailed("maintenance".into()));
        assert_eq!(store.snapshot().cards.len(), 1);
        assert_eq!(sync.last_error().as_deref(), Some("maintenance"));
        assert!(!sync.is_loading());
    }
}

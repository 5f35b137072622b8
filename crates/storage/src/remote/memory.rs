use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use study_core::Clock;
use study_core::model::{Card, CardId, Category, CategoryId};

use super::{ApiError, CardQuery, CategoryQuery, StudyAck, StudyApi};

/// One `record_study` call accepted by the in-memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedStudy {
    pub card_id: CardId,
    pub success: bool,
}

#[derive(Default)]
struct State {
    cards: BTreeMap<CardId, Card>,
    categories: BTreeMap<CategoryId, Category>,
    signed_out: bool,
    fail_next_record: Option<String>,
    fail_next_list: Option<String>,
    recorded: Vec<RecordedStudy>,
    card_list_calls: usize,
    record_gate: Option<Arc<Semaphore>>,
}

/// In-memory `StudyApi` for tests and prototyping.
///
/// Collections are returned in id order. `study=true` selects cards whose
/// `next_study` is unset or not after the clock's current time. Recording an
/// outcome bumps `study_count`; `next_study` is left alone.
#[derive(Clone, Default)]
pub struct InMemoryStudyApi {
    clock: Clock,
    state: Arc<Mutex<State>>,
}

impl InMemoryStudyApi {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, ApiError> {
        self.state
            .lock()
            .map_err(|e| ApiError::RequestFailed(e.to_string()))
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn upsert_category(&self, category: Category) {
        self.with_state(|state| {
            state.categories.insert(category.id, category);
        });
    }

    pub fn upsert_card(&self, card: Card) {
        self.with_state(|state| {
            state.cards.insert(card.id, card);
        });
    }

    pub fn remove_card(&self, id: CardId) {
        self.with_state(|state| {
            state.cards.remove(&id);
        });
    }

    #[must_use]
    pub fn card(&self, id: CardId) -> Option<Card> {
        self.with_state(|state| state.cards.get(&id).cloned())
    }

    /// Drop the credential; every later call fails with `AuthenticationRequired`.
    pub fn sign_out(&self) {
        self.with_state(|state| state.signed_out = true);
    }

    /// Make the next `record_study` call fail with `message`.
    pub fn fail_next_record(&self, message: impl Into<String>) {
        let message = message.into();
        self.with_state(|state| state.fail_next_record = Some(message));
    }

    /// Make the next `list_cards` or `list_categories` call fail with `message`.
    pub fn fail_next_list(&self, message: impl Into<String>) {
        let message = message.into();
        self.with_state(|state| state.fail_next_list = Some(message));
    }

    /// Accepted `record_study` calls, oldest first.
    #[must_use]
    pub fn recorded(&self) -> Vec<RecordedStudy> {
        self.with_state(|state| state.recorded.clone())
    }

    #[must_use]
    pub fn card_list_calls(&self) -> usize {
        self.with_state(|state| state.card_list_calls)
    }

    /// Park every `record_study` call until `release_records` lets it through.
    pub fn hold_records(&self) {
        self.with_state(|state| state.record_gate = Some(Arc::new(Semaphore::new(0))));
    }

    /// Let `count` parked or future `record_study` calls proceed.
    pub fn release_records(&self, count: usize) {
        if let Some(gate) = self.with_state(|state| state.record_gate.clone()) {
            gate.add_permits(count);
        }
    }

    fn check_list(state: &mut State) -> Result<(), ApiError> {
        if state.signed_out {
            return Err(ApiError::AuthenticationRequired);
        }
        if let Some(message) = state.fail_next_list.take() {
            return Err(ApiError::RequestFailed(message));
        }
        Ok(())
    }
}

fn page<T>(items: impl Iterator<Item = T>, skip: Option<u32>, limit: Option<u32>) -> Vec<T> {
    let skip = skip.map_or(0, |s| s as usize);
    let limit = limit.map_or(usize::MAX, |l| l as usize);
    items.skip(skip).take(limit).collect()
}

#[async_trait]
impl StudyApi for InMemoryStudyApi {
    async fn list_categories(&self, query: &CategoryQuery) -> Result<Vec<Category>, ApiError> {
        let mut state = self.lock()?;
        Self::check_list(&mut state)?;
        Ok(page(
            state.categories.values().cloned(),
            query.skip,
            query.limit,
        ))
    }

    async fn list_cards(&self, query: &CardQuery) -> Result<Vec<Card>, ApiError> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        state.card_list_calls += 1;
        Self::check_list(&mut state)?;

        let matching = state.cards.values().filter(|card| {
            query.category_id.is_none_or(|id| card.category_id == id)
                && query.tag.as_deref().is_none_or(|tag| card.has_tag(tag))
                && (query.study != Some(true)
                    || card.next_study.is_none_or(|due| due <= now))
        });
        Ok(page(matching.cloned(), query.skip, query.limit))
    }

    async fn record_study(&self, card_id: CardId, success: bool) -> Result<StudyAck, ApiError> {
        let gate = {
            let state = self.lock()?;
            if state.signed_out {
                return Err(ApiError::AuthenticationRequired);
            }
            state.record_gate.clone()
        };
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| ApiError::RequestFailed(e.to_string()))?
                .forget();
        }

        let mut state = self.lock()?;
        if let Some(message) = state.fail_next_record.take() {
            return Err(ApiError::RequestFailed(message));
        }
        let card = state
            .cards
            .get_mut(&card_id)
            .ok_or_else(|| ApiError::RequestFailed("Card not found".into()))?;
        card.study_count = card.study_count.saturating_add(1);
        state.recorded.push(RecordedStudy { card_id, success });

        Ok(StudyAck {
            message: "Study recorded successfully".into(),
        })
    }
}

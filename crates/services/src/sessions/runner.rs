use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use study_core::Clock;
use study_core::model::{Card, CardId};

use crate::error::{RecordError, SessionError};
use super::progress::{SessionProgress, SessionReport};
use super::recorder::{OutcomeRecorder, RecordReceipt};
use super::selector::{SessionFilter, SessionSelector};

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The filter matched no cards.
    Empty,
    /// A card is on screen.
    Reviewing,
    /// Every card has been answered. Stays here until `restart`.
    Complete,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::Empty => "empty",
            SessionStatus::Reviewing => "reviewing",
            SessionStatus::Complete => "complete",
        };
        f.write_str(label)
    }
}

/// Ephemeral traversal state. The card set is fixed when the session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    cards: Vec<Card>,
    current_index: usize,
    is_flipped: bool,
}

impl SessionState {
    fn new(cards: Vec<Card>) -> Self {
        Self {
            cards,
            current_index: 0,
            is_flipped: false,
        }
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn is_flipped(&self) -> bool {
        self.is_flipped
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        if self.cards.is_empty() {
            SessionStatus::Empty
        } else if self.current_index < self.cards.len() {
            SessionStatus::Reviewing
        } else {
            SessionStatus::Complete
        }
    }

    #[must_use]
    pub fn current_card(&self) -> Option<&Card> {
        self.cards.get(self.current_index)
    }
}

/// One answer accepted by the remote store during this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAnswer {
    pub card_id: CardId,
    pub success: bool,
    /// Whether the `CardStore` was refreshed after the write.
    pub reconciled: bool,
    /// Status after the session advanced past this card.
    pub status: SessionStatus,
}

struct PendingAnswer {
    card_id: CardId,
    handle: JoinHandle<Result<RecordReceipt, RecordError>>,
}

//
// ─── RUNNER ────────────────────────────────────────────────────────────────────
//

/// Drives one study session: flip, answer, advance, restart.
///
/// Transitions take `&mut self`, so a single owner serializes them. On top of
/// that at most one outcome report is in flight: if an `answer` future is
/// dropped mid-report, the report keeps running and is adopted by the next
/// `answer` or `settle` instead of being sent twice.
pub struct SessionRunner {
    clock: Clock,
    selector: SessionSelector,
    recorder: OutcomeRecorder,
    filter: SessionFilter,
    state: SessionState,
    results: Vec<SessionAnswer>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    pending: Option<PendingAnswer>,
}

impl SessionRunner {
    /// Select the cards for `filter` and open a session over them.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Select` if the selection fetch fails. A filter
    /// that matches nothing opens an `Empty` session instead of failing.
    pub async fn start(
        clock: Clock,
        selector: SessionSelector,
        recorder: OutcomeRecorder,
        filter: SessionFilter,
    ) -> Result<Self, SessionError> {
        let cards = selector.select(&filter).await?;
        let mut runner = Self {
            clock,
            selector,
            recorder,
            filter,
            state: SessionState::new(Vec::new()),
            results: Vec::new(),
            started_at: clock.now(),
            completed_at: None,
            pending: None,
        };
        runner.reset(cards);
        Ok(runner)
    }

    fn reset(&mut self, cards: Vec<Card>) {
        self.state = SessionState::new(cards);
        self.results.clear();
        self.started_at = self.clock.now();
        self.completed_at = None;
        info!(
            filter = %self.filter,
            cards = self.state.cards.len(),
            status = %self.state.status(),
            "session started"
        );
    }

    #[must_use]
    pub fn filter(&self) -> &SessionFilter {
        &self.filter
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    #[must_use]
    pub fn current_card(&self) -> Option<&Card> {
        self.state.current_card()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    #[must_use]
    pub fn is_flipped(&self) -> bool {
        self.state.is_flipped
    }

    /// Text of the side currently facing the learner.
    #[must_use]
    pub fn visible_text(&self) -> Option<&str> {
        self.current_card()
            .map(|card| card.text(self.state.is_flipped))
    }

    /// One-based position of the current card and the session size.
    #[must_use]
    pub fn position(&self) -> Option<(usize, usize)> {
        self.current_card()
            .map(|_| (self.state.current_index + 1, self.state.cards.len()))
    }

    /// Whether an outcome report is still outstanding.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn results(&self) -> &[SessionAnswer] {
        &self.results
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.state.cards.len();
        SessionProgress {
            total,
            answered: self.results.len(),
            remaining: total.saturating_sub(self.state.current_index),
            is_complete: self.status() == SessionStatus::Complete,
        }
    }

    #[must_use]
    pub fn report(&self) -> SessionReport {
        let correct = self.results.iter().filter(|answer| answer.success).count();
        SessionReport {
            filter: self.filter.clone(),
            total: self.state.cards.len(),
            correct,
            incorrect: self.results.len() - correct,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            status: self.status(),
        }
    }

    /// Turn the current card over. Returns the new flip state.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is `Reviewing`.
    pub fn flip(&mut self) -> Result<bool, SessionError> {
        if self.status() != SessionStatus::Reviewing {
            return Err(self.invalid("flip"));
        }
        self.state.is_flipped = !self.state.is_flipped;
        Ok(self.state.is_flipped)
    }

    /// Report an outcome for the current card, then advance.
    ///
    /// The session only moves on once the remote store has accepted the
    /// outcome. If a report abandoned by an earlier, dropped call has since
    /// finished, that report is settled and returned instead; no second
    /// report is sent for the card.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidTransition` unless the session is `Reviewing`.
    /// - `SessionError::AnswerPending` while an earlier report is still running.
    /// - `SessionError::Record` when the report fails. Position and flip state
    ///   are kept so the learner can retry.
    pub async fn answer(&mut self, success: bool) -> Result<SessionAnswer, SessionError> {
        if let Some(pending) = &self.pending {
            if !pending.handle.is_finished() {
                return Err(SessionError::AnswerPending {
                    card_id: pending.card_id,
                });
            }
            debug!(card_id = %pending.card_id, "settling abandoned study report");
            return self.settle_pending().await;
        }

        let Some(card) = self.state.current_card() else {
            return Err(self.invalid("answer"));
        };
        let card_id = card.id;

        let handle = self.recorder.spawn_record(card_id, success);
        self.pending = Some(PendingAnswer { card_id, handle });
        self.settle_pending().await
    }

    /// Wait for an outstanding report, if any, and apply its outcome.
    pub async fn settle(&mut self) -> Option<Result<SessionAnswer, SessionError>> {
        if self.pending.is_none() {
            return None;
        }
        Some(self.settle_pending().await)
    }

    async fn settle_pending(&mut self) -> Result<SessionAnswer, SessionError> {
        let Some(pending) = self.pending.as_mut() else {
            return Err(self.invalid("settle"));
        };
        // If this future is dropped here, `pending` stays put for the next call.
        let joined = (&mut pending.handle).await;
        let card_id = pending.card_id;
        self.pending = None;

        let receipt = match joined {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(err)) => {
                warn!(%card_id, error = %err, "answer not recorded; staying on card");
                return Err(err.into());
            }
            Err(err) => {
                warn!(%card_id, error = %err, "study report task was lost");
                return Err(RecordError::Aborted.into());
            }
        };

        Ok(self.advance(&receipt))
    }

    fn advance(&mut self, receipt: &RecordReceipt) -> SessionAnswer {
        self.state.current_index += 1;
        self.state.is_flipped = false;

        let status = self.status();
        if status == SessionStatus::Complete {
            self.completed_at = Some(self.clock.now());
            info!(
                filter = %self.filter,
                answered = self.results.len() + 1,
                "session complete"
            );
        }

        let answer = SessionAnswer {
            card_id: receipt.card_id,
            success: receipt.success,
            reconciled: receipt.reconciled,
            status,
        };
        self.results.push(answer.clone());
        answer
    }

    /// Fetch the selection again and start over from the first card.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` while `Reviewing`, and
    /// `SessionError::Select` if the fetch fails; the current state is kept then.
    pub async fn restart(&mut self) -> Result<SessionStatus, SessionError> {
        if self.status() == SessionStatus::Reviewing {
            return Err(self.invalid("restart"));
        }
        let cards = self.selector.select(&self.filter).await?;
        self.reset(cards);
        Ok(self.status())
    }
}

impl fmt::Debug for SessionRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRunner")
            .field("filter", &self.filter)
            .field("cards_len", &self.state.cards.len())
            .field("current_index", &self.state.current_index)
            .field("is_flipped", &self.state.is_flipped)
            .field("results_len", &self.results.len())
            .field("pending", &self.pending.as_ref().map(|p| p.card_id))
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::SessionConfig;
    use crate::sync::StoreSync;
    use study_core::model::{CategoryId, TagName};
    use study_core::time::{fixed_clock, fixed_now};
    use study_storage::remote::InMemoryStudyApi;
    use study_storage::{ApiError, CardStore, StudyApi};

    fn build_card(id: u64, tags: &[&str]) -> Card {
        Card {
            id: CardId::new(id),
            front: format!("front {id}"),
            back: format!("back {id}"),
            category_id: CategoryId::new(1),
            tags: tags.iter().map(|t| (*t).to_owned()).collect(),
            study_count: 0,
            next_study: None,
            created_at: fixed_now(),
        }
    }

    fn services(api: &InMemoryStudyApi) -> (SessionSelector, OutcomeRecorder, Arc<CardStore>) {
        let shared: Arc<dyn StudyApi> = Arc::new(api.clone());
        let store = Arc::new(CardStore::new());
        let sync = StoreSync::new(fixed_clock(), Arc::clone(&shared), Arc::clone(&store));
        (
            SessionSelector::new(Arc::clone(&shared), SessionConfig::default()),
            OutcomeRecorder::new(shared, sync),
            store,
        )
    }

    async fn start(api: &InMemoryStudyApi, filter: SessionFilter) -> SessionRunner {
        let (selector, recorder, _store) = services(api);
        SessionRunner::start(fixed_clock(), selector, recorder, filter)
            .await
            .unwrap()
    }

    fn category_one() -> SessionFilter {
        SessionFilter::Category(CategoryId::new(1))
    }

    #[tokio::test]
    async fn empty_selection_starts_empty() {
        let api = InMemoryStudyApi::new(fixed_clock());
        let mut runner = start(&api, category_one()).await;

        assert_eq!(runner.status(), SessionStatus::Empty);
        assert!(runner.current_card().is_none());
        assert!(matches!(
            runner.flip(),
            Err(SessionError::InvalidTransition { action: "flip", status: SessionStatus::Empty })
        ));
        assert!(matches!(
            runner.answer(true).await,
            Err(SessionError::InvalidTransition { action: "answer", .. })
        ));
    }

    #[tokio::test]
    async fn starts_reviewing_first_card_face_up() {
        let api = InMemoryStudyApi::new(fixed_clock());
        api.upsert_card(build_card(1, &[]));
        api.upsert_card(build_card(2, &[]));

        let runner = start(&api, category_one()).await;

        assert_eq!(runner.status(), SessionStatus::Reviewing);
        assert_eq!(runner.current_index(), 0);
        assert!(!runner.is_flipped());
        assert_eq!(runner.position(), Some((1, 2)));
        assert_eq!(runner.visible_text(), Some("front 1"));
    }

    #[tokio::test]
    async fn flip_twice_restores_face_without_moving() {
        let api = InMemoryStudyApi::new(fixed_clock());
        api.upsert_card(build_card(1, &[]));
        let mut runner = start(&api, category_one()).await;

        assert!(runner.flip().unwrap());
        assert_eq!(runner.visible_text(), Some("back 1"));
        assert!(!runner.flip().unwrap());
        assert_eq!(runner.current_index(), 0);
        assert_eq!(runner.visible_text(), Some("front 1"));
    }

    #[tokio::test]
    async fn answering_last_card_completes_session() {
        let api = InMemoryStudyApi::new(fixed_clock());
        api.upsert_card(build_card(1, &[]));
        let mut runner = start(&api, category_one()).await;
        runner.flip().unwrap();

        let answer = runner.answer(false).await.unwrap();

        assert_eq!(answer.card_id, CardId::new(1));
        assert_eq!(answer.status, SessionStatus::Complete);
        assert!(answer.reconciled);
        assert_eq!(runner.status(), SessionStatus::Complete);
        assert!(!runner.is_flipped());
        assert_eq!(runner.completed_at(), Some(fixed_now()));
        assert!(matches!(
            runner.answer(true).await,
            Err(SessionError::InvalidTransition { status: SessionStatus::Complete, .. })
        ));

        let report = runner.report();
        assert_eq!((report.correct, report.incorrect, report.total), (0, 1, 1));
    }

    #[tokio::test]
    async fn failed_report_keeps_position_and_flip() {
        let api = InMemoryStudyApi::new(fixed_clock());
        api.upsert_card(build_card(1, &[]));
        let mut runner = start(&api, category_one()).await;
        runner.flip().unwrap();
        api.fail_next_record("Database unavailable");

        let err = runner.answer(true).await.unwrap_err();

        assert_eq!(
            err,
            SessionError::Record(RecordError::Api(ApiError::RequestFailed(
                "Database unavailable".into()
            )))
        );
        assert_eq!(runner.status(), SessionStatus::Reviewing);
        assert_eq!(runner.current_index(), 0);
        assert!(runner.is_flipped());
        assert!(!runner.is_pending());

        let answer = runner.answer(true).await.unwrap();
        assert_eq!(answer.status, SessionStatus::Complete);
        assert_eq!(api.recorded().len(), 1);
    }

    #[tokio::test]
    async fn restart_is_rejected_while_reviewing() {
        let api = InMemoryStudyApi::new(fixed_clock());
        api.upsert_card(build_card(1, &[]));
        let mut runner = start(&api, category_one()).await;

        assert!(matches!(
            runner.restart().await,
            Err(SessionError::InvalidTransition { action: "restart", .. })
        ));
    }

    #[tokio::test]
    async fn restart_refetches_instead_of_reusing_cards() {
        let api = InMemoryStudyApi::new(fixed_clock());
        api.upsert_card(build_card(1, &["verbs"]));
        let filter = SessionFilter::Tag(TagName::new("verbs").unwrap());
        let mut runner = start(&api, filter).await;
        runner.answer(true).await.unwrap();
        assert_eq!(runner.status(), SessionStatus::Complete);

        api.remove_card(CardId::new(1));
        api.upsert_card(build_card(7, &["verbs"]));
        api.upsert_card(build_card(8, &["verbs"]));
        let calls_before = api.card_list_calls();

        let status = runner.restart().await.unwrap();

        assert_eq!(status, SessionStatus::Reviewing);
        assert!(api.card_list_calls() > calls_before);
        assert_eq!(runner.current_card().map(|c| c.id), Some(CardId::new(7)));
        assert_eq!(runner.position(), Some((1, 2)));
        assert!(runner.results().is_empty());
        assert!(runner.completed_at().is_none());
    }

    #[tokio::test]
    async fn restart_from_empty_can_find_new_cards() {
        let api = InMemoryStudyApi::new(fixed_clock());
        let mut runner = start(&api, category_one()).await;
        assert_eq!(runner.status(), SessionStatus::Empty);

        api.upsert_card(build_card(3, &[]));

        assert_eq!(runner.restart().await.unwrap(), SessionStatus::Reviewing);
    }

    #[tokio::test]
    async fn failed_restart_keeps_completed_state() {
        let api = InMemoryStudyApi::new(fixed_clock());
        api.upsert_card(build_card(1, &[]));
        let mut runner = start(&api, category_one()).await;
        runner.answer(true).await.unwrap();
        api.fail_next_list("Request failed");

        let err = runner.restart().await.unwrap_err();

        assert_eq!(err, SessionError::Select(ApiError::RequestFailed("Request failed".into())));
        assert_eq!(runner.status(), SessionStatus::Complete);
        assert_eq!(runner.results().len(), 1);
    }

    #[tokio::test]
    async fn dropped_answer_is_recorded_once_and_adopted() {
        let api = InMemoryStudyApi::new(fixed_clock());
        api.upsert_card(build_card(1, &[]));
        api.upsert_card(build_card(2, &[]));
        let (selector, recorder, store) = services(&api);
        let mut runner = SessionRunner::start(fixed_clock(), selector, recorder, category_one())
            .await
            .unwrap();
        api.hold_records();

        let abandoned =
            tokio::time::timeout(std::time::Duration::from_millis(20), runner.answer(true)).await;
        assert!(abandoned.is_err());
        assert!(runner.is_pending());
        assert!(matches!(
            runner.answer(false).await,
            Err(SessionError::AnswerPending { card_id }) if card_id == CardId::new(1)
        ));
        assert_eq!(runner.current_index(), 0);

        api.release_records(1);
        let settled = runner.settle().await.unwrap().unwrap();

        assert_eq!(settled.card_id, CardId::new(1));
        assert!(settled.success);
        assert_eq!(runner.current_index(), 1);
        assert_eq!(api.recorded().len(), 1);
        assert_eq!(store.snapshot().card(CardId::new(1)).unwrap().study_count, 1);
        assert!(runner.settle().await.is_none());
    }
}

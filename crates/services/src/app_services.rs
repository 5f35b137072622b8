use std::sync::Arc;

use study_storage::remote::{ApiConfig, ApiConfigError, HttpStudyApi};
use study_storage::{ApiError, CardStore, StoreSnapshot, StudyApi};

use crate::Clock;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::overview::StudyOverview;
use crate::sessions::{OutcomeRecorder, SessionFilter, SessionRunner, SessionSelector};
use crate::sync::StoreSync;

/// Assembles the study services around one remote store and one `CardStore`.
#[derive(Clone)]
pub struct StudyServices {
    clock: Clock,
    store: Arc<CardStore>,
    sync: StoreSync,
    overview: StudyOverview,
    selector: SessionSelector,
    recorder: OutcomeRecorder,
}

impl StudyServices {
    #[must_use]
    pub fn new(api: Arc<dyn StudyApi>, clock: Clock, config: SessionConfig) -> Self {
        let store = Arc::new(CardStore::new());
        let sync = StoreSync::new(clock, Arc::clone(&api), Arc::clone(&store));
        let overview = StudyOverview::new(Arc::clone(&store));
        let selector = SessionSelector::new(Arc::clone(&api), config);
        let recorder = OutcomeRecorder::new(api, sync.clone());

        Self {
            clock,
            store,
            sync,
            overview,
            selector,
            recorder,
        }
    }

    /// Build services backed by the HTTP remote store.
    ///
    /// # Errors
    ///
    /// Returns `ApiConfigError` if the HTTP client cannot be created.
    pub fn http(api_config: &ApiConfig, config: SessionConfig) -> Result<Self, ApiConfigError> {
        let api: Arc<dyn StudyApi> = Arc::new(HttpStudyApi::new(api_config)?);
        Ok(Self::new(api, Clock::default(), config))
    }

    #[must_use]
    pub fn store(&self) -> Arc<CardStore> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn sync(&self) -> &StoreSync {
        &self.sync
    }

    #[must_use]
    pub fn overview(&self) -> &StudyOverview {
        &self.overview
    }

    #[must_use]
    pub fn selector(&self) -> &SessionSelector {
        &self.selector
    }

    #[must_use]
    pub fn recorder(&self) -> &OutcomeRecorder {
        &self.recorder
    }

    /// Load the full collections into the store.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if either collection cannot be fetched.
    pub async fn refresh(&self) -> Result<Arc<StoreSnapshot>, ApiError> {
        self.sync.refresh().await
    }

    /// Open a session over the cards matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Select` if the selection fetch fails.
    pub async fn start_session(&self, filter: SessionFilter) -> Result<SessionRunner, SessionError> {
        SessionRunner::start(
            self.clock,
            self.selector.clone(),
            self.recorder.clone(),
            filter,
        )
        .await
    }
}

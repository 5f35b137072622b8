use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use study_core::model::CardId;
use study_storage::StudyApi;

use crate::error::RecordError;
use crate::sync::StoreSync;

/// Outcome of a recorded study answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReceipt {
    pub card_id: CardId,
    pub success: bool,
    /// Acknowledgement text from the server.
    pub message: String,
    /// Whether the follow-up refresh reached the `CardStore`.
    pub reconciled: bool,
}

/// Reports study outcomes and reconciles the `CardStore` afterwards.
///
/// No local counter is ever bumped: `study_count` and every summary only
/// advance through the refresh that follows a successful write.
#[derive(Clone)]
pub struct OutcomeRecorder {
    api: Arc<dyn StudyApi>,
    sync: StoreSync,
}

impl OutcomeRecorder {
    #[must_use]
    pub fn new(api: Arc<dyn StudyApi>, sync: StoreSync) -> Self {
        Self { api, sync }
    }

    /// Record an outcome and wait for the store to be reconciled.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Api` when the write fails; the store is untouched
    /// and nothing is retried. Returns `RecordError::Aborted` if the runtime
    /// dropped the task.
    pub async fn record(&self, card_id: CardId, success: bool) -> Result<RecordReceipt, RecordError> {
        self.spawn_record(card_id, success)
            .await
            .map_err(|err| {
                warn!(%card_id, error = %err, "study record task failed to join");
                RecordError::Aborted
            })?
    }

    /// Start recording on its own task.
    ///
    /// The write and the refresh keep running even if the returned handle is
    /// dropped, so abandoning the caller never loses a recorded answer.
    #[must_use]
    pub fn spawn_record(
        &self,
        card_id: CardId,
        success: bool,
    ) -> JoinHandle<Result<RecordReceipt, RecordError>> {
        let recorder = self.clone();
        tokio::spawn(async move { recorder.write_and_reconcile(card_id, success).await })
    }

    async fn write_and_reconcile(
        &self,
        card_id: CardId,
        success: bool,
    ) -> Result<RecordReceipt, RecordError> {
        let ack = match self.api.record_study(card_id, success).await {
            Ok(ack) => ack,
            Err(err) => {
                warn!(%card_id, success, error = %err, "study outcome was not recorded");
                self.sync.set_last_error(Some(err.to_string()));
                return Err(err.into());
            }
        };

        // The write has landed; a failed refresh is logged but does not undo it.
        let reconciled = self.sync.refresh().await.is_ok();
        info!(%card_id, success, reconciled, "study outcome recorded");

        Ok(RecordReceipt {
            card_id,
            success,
            message: ack.message,
            reconciled,
        })
    }
}

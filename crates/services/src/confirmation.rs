use std::sync::Arc;

use chrono::{DateTime, Utc};
use progress_core::model::{ConfirmationStatus, ProgressRecordId, TaskProgressRecord};
use storage::repository::{ProgressPatch, ProgressRepository, StorageError};

use crate::Clock;
use crate::error::ConfirmationError;

/// A reviewer's verdict on one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Accepted,
    Rejected,
}

impl ReviewDecision {
    #[must_use]
    fn confirmation(self) -> ConfirmationStatus {
        match self {
            ReviewDecision::Accepted => ConfirmationStatus::Accepted,
            ReviewDecision::Rejected => ConfirmationStatus::Rejected,
        }
    }
}

/// The admin-facing decision function over submitted work.
///
/// Decisions address records by row id: the reviewer picks an entry out of
/// the pending queue, which spans users and programs.
#[derive(Clone)]
pub struct ConfirmationWorkflow {
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
}

impl ConfirmationWorkflow {
    #[must_use]
    pub fn new(clock: Clock, progress: Arc<dyn ProgressRepository>) -> Self {
        Self { clock, progress }
    }

    /// Records a review decision with mandatory feedback.
    ///
    /// The target must be awaiting review: completed with a pending gate.
    /// On rejection the task stays `completed` — the submitted artifact still
    /// exists; only the confirmation gate turns negative, and the user's
    /// "redo" is a later resubmission, not a status rollback.
    ///
    /// `expected_updated_at` is an optional concurrency token: pass the
    /// record's last-seen timestamp to fail with `StaleRecord` instead of
    /// overwriting a decision another reviewer landed first. `None` keeps
    /// plain last-write-wins.
    ///
    /// # Errors
    ///
    /// `EmptyComment` before anything is read or written, `NotFound` for an
    /// unknown record, `NotReviewable` when the precondition fails,
    /// `StaleRecord` on token mismatch, `Storage` otherwise.
    pub async fn decide(
        &self,
        record_id: ProgressRecordId,
        decision: ReviewDecision,
        comment: &str,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> Result<TaskProgressRecord, ConfirmationError> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(ConfirmationError::EmptyComment);
        }

        let record = match self.progress.get_by_id(record_id).await {
            Ok(record) => record,
            Err(StorageError::NotFound) => return Err(ConfirmationError::NotFound),
            Err(other) => return Err(other.into()),
        };

        if !record.is_reviewable() {
            return Err(ConfirmationError::NotReviewable {
                status: record.status,
                confirmation: record.confirmation_status,
            });
        }

        if let Some(seen) = expected_updated_at {
            if seen != record.updated_at {
                return Err(ConfirmationError::StaleRecord);
            }
        }

        let updated = self
            .progress
            .update_by_id(
                record_id,
                ProgressPatch {
                    confirmation_status: Some(decision.confirmation()),
                    comment: Some(Some(comment.to_owned())),
                    ..ProgressPatch::default()
                },
                self.clock.now(),
            )
            .await?;
        Ok(updated)
    }

    /// Submissions awaiting review, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ConfirmationError::Storage` on repository failures.
    pub async fn pending_queue(&self) -> Result<Vec<TaskProgressRecord>, ConfirmationError> {
        Ok(self.progress.list_pending().await?)
    }
}

use std::sync::Arc;

use progress_core::model::{
    ArtifactUrl, ConfirmationStatus, ProgressError, ProgressKey, TaskProgressRecord, TaskStatus,
    UserId,
};
use storage::repository::{ObjectStore, ProgressPatch, ProgressRepository};

use crate::Clock;
use crate::error::TaskProgressError;

/// Drives the task state machine for the authenticated user.
///
/// Every operation takes the caller's `principal` and refuses keys that name
/// a different user before touching storage. The record key's `user_id` comes
/// from the client, the principal from the identity provider; they must agree.
#[derive(Clone)]
pub struct TaskProgressService {
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
    objects: Arc<dyn ObjectStore>,
}

impl TaskProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            clock,
            progress,
            objects,
        }
    }

    fn ensure_owner(principal: UserId, key: &ProgressKey) -> Result<(), TaskProgressError> {
        if key.user_id != principal {
            return Err(TaskProgressError::IdentityMismatch);
        }
        Ok(())
    }

    /// Marks a task as started the first time the user opens it.
    ///
    /// Idempotent: a task already in progress or completed is returned
    /// unchanged — opening must never erase progress or reviewer feedback.
    ///
    /// # Errors
    ///
    /// Returns `TaskProgressError` on identity mismatch or storage failures.
    pub async fn open_task(
        &self,
        principal: UserId,
        key: &ProgressKey,
    ) -> Result<TaskProgressRecord, TaskProgressError> {
        Self::ensure_owner(principal, key)?;

        if let Some(existing) = self.progress.get(key).await? {
            if existing.status != TaskStatus::NotStarted {
                return Ok(existing);
            }
        }

        let record = self
            .progress
            .upsert(
                key,
                ProgressPatch {
                    status: Some(TaskStatus::InProgress),
                    confirmation_status: Some(ConfirmationStatus::None),
                    ..ProgressPatch::default()
                },
                self.clock.now(),
            )
            .await?;
        Ok(record)
    }

    /// Records a submission: the task becomes completed and enters the
    /// review gate.
    ///
    /// Valid from any prior status — submitting implies the task was worked
    /// on, whether or not it was ever opened. Any earlier reviewer comment is
    /// cleared together with the old artifact.
    ///
    /// # Errors
    ///
    /// Returns `TaskProgressError::EmptyArtifact` / `InvalidArtifact` before
    /// anything is written, `AlreadyAccepted` if the submission has already
    /// passed review, `IdentityMismatch` or `Storage` otherwise.
    pub async fn submit_work(
        &self,
        principal: UserId,
        key: &ProgressKey,
        artifact: &str,
    ) -> Result<TaskProgressRecord, TaskProgressError> {
        Self::ensure_owner(principal, key)?;
        let url = parse_artifact(artifact)?;

        if let Some(existing) = self.progress.get(key).await? {
            if existing.is_accepted() {
                return Err(TaskProgressError::AlreadyAccepted);
            }
        }

        let record = self
            .progress
            .upsert(
                key,
                ProgressPatch {
                    status: Some(TaskStatus::Completed),
                    confirmation_status: Some(ConfirmationStatus::Pending),
                    uploaded_work_url: Some(Some(url)),
                    comment: Some(None),
                },
                self.clock.now(),
            )
            .await?;
        Ok(record)
    }

    /// Replaces a rejected submission with a new attempt.
    ///
    /// Same write as `submit_work`: the gate returns to pending and the old
    /// feedback is discarded once a new attempt exists.
    ///
    /// # Errors
    ///
    /// See `submit_work`.
    pub async fn resubmit_work(
        &self,
        principal: UserId,
        key: &ProgressKey,
        artifact: &str,
    ) -> Result<TaskProgressRecord, TaskProgressError> {
        self.submit_work(principal, key, artifact).await
    }

    /// Uploads submission bytes and records the submission in one call.
    ///
    /// The artifact is persisted to the object store first, so a poll racing
    /// this call either sees the old state or the fully recorded submission,
    /// never a submission whose artifact is missing.
    ///
    /// # Errors
    ///
    /// See `submit_work`; object-store failures surface as `Storage`.
    pub async fn submit_upload(
        &self,
        principal: UserId,
        key: &ProgressKey,
        bytes: &[u8],
        ext: &str,
    ) -> Result<TaskProgressRecord, TaskProgressError> {
        Self::ensure_owner(principal, key)?;

        if let Some(existing) = self.progress.get(key).await? {
            if existing.is_accepted() {
                return Err(TaskProgressError::AlreadyAccepted);
            }
        }

        let path = format!(
            "{}/{}-{}.{}",
            key.user_id,
            key.task_id,
            self.clock.now().timestamp(),
            ext
        );
        let url = self.objects.put_object(&path, bytes).await?;
        self.submit_work(principal, key, url.as_str()).await
    }

    /// The caller's own record for a task, if any.
    ///
    /// # Errors
    ///
    /// Returns `TaskProgressError` on identity mismatch or storage failures.
    pub async fn record(
        &self,
        principal: UserId,
        key: &ProgressKey,
    ) -> Result<Option<TaskProgressRecord>, TaskProgressError> {
        Self::ensure_owner(principal, key)?;
        Ok(self.progress.get(key).await?)
    }
}

fn parse_artifact(artifact: &str) -> Result<ArtifactUrl, TaskProgressError> {
    ArtifactUrl::parse(artifact).map_err(|e| match e {
        ProgressError::EmptyArtifactUrl => TaskProgressError::EmptyArtifact,
        ProgressError::InvalidArtifactUrl(raw) => TaskProgressError::InvalidArtifact(raw),
        other => TaskProgressError::InvalidArtifact(other.to_string()),
    })
}

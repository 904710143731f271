use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::ids::{ProgramId, ProgressRecordId, TaskId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("artifact url cannot be empty")]
    EmptyArtifactUrl,

    #[error("artifact url is not a valid url: {0}")]
    InvalidArtifactUrl(String),

    #[error("unknown task status: {0}")]
    UnknownStatus(String),

    #[error("unknown confirmation status: {0}")]
    UnknownConfirmationStatus(String),

    #[error("confirmation status {confirmation} requires a completed task, found {status}")]
    ConfirmationWithoutCompletion {
        status: TaskStatus,
        confirmation: ConfirmationStatus,
    },

    #[error("reviewer comment present without a review decision")]
    CommentWithoutDecision,
}

//
// ─── TASK STATUS ───────────────────────────────────────────────────────────────
//

/// Lifecycle status of one task for one user.
///
/// The three-value domain is closed: rejection of a submission does not
/// introduce a fourth value, it only flips the confirmation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Canonical string form used at the storage and API boundary.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    /// Parses the canonical string form.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownStatus` for anything else.
    pub fn parse_str(s: &str) -> Result<Self, ProgressError> {
        match s {
            "not_started" => Ok(TaskStatus::NotStarted),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(ProgressError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── CONFIRMATION STATUS ───────────────────────────────────────────────────────
//

/// Reviewer verdict gate on a completed task's submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    None,
    Pending,
    Accepted,
    Rejected,
}

impl ConfirmationStatus {
    /// Canonical string form. Only these spellings are ever written.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConfirmationStatus::None => "none",
            ConfirmationStatus::Pending => "pending",
            ConfirmationStatus::Accepted => "accepted",
            ConfirmationStatus::Rejected => "rejected",
        }
    }

    /// Parses a stored confirmation status.
    ///
    /// This is the single normalization point for acceptance synonyms: legacy
    /// rows may carry `"confirmed"` or `"approved"`, which both map to
    /// `Accepted`. Business logic only ever sees the canonical variant.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownConfirmationStatus` for anything else.
    pub fn parse_str(s: &str) -> Result<Self, ProgressError> {
        match s {
            "none" => Ok(ConfirmationStatus::None),
            "pending" => Ok(ConfirmationStatus::Pending),
            "accepted" | "confirmed" | "approved" => Ok(ConfirmationStatus::Accepted),
            "rejected" => Ok(ConfirmationStatus::Rejected),
            other => Err(ProgressError::UnknownConfirmationStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── ARTIFACT URL ──────────────────────────────────────────────────────────────
//

/// Addressable pointer to a stored submission artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactUrl(Url);

impl ArtifactUrl {
    /// Parses and validates an artifact url.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::EmptyArtifactUrl` for blank input and
    /// `ProgressError::InvalidArtifactUrl` if it does not parse as a url.
    pub fn parse(s: &str) -> Result<Self, ProgressError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ProgressError::EmptyArtifactUrl);
        }
        let url = Url::parse(trimmed)
            .map_err(|_| ProgressError::InvalidArtifactUrl(trimmed.to_string()))?;
        Ok(Self(url))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl std::fmt::Display for ArtifactUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── PROGRESS KEY ──────────────────────────────────────────────────────────────
//

/// The unique key of a progress record: one task, one user, one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressKey {
    pub user_id: UserId,
    pub program_id: ProgramId,
    pub task_id: TaskId,
}

impl ProgressKey {
    #[must_use]
    pub fn new(user_id: UserId, program_id: ProgramId, task_id: TaskId) -> Self {
        Self {
            user_id,
            program_id,
            task_id,
        }
    }
}

//
// ─── PROGRESS RECORD ───────────────────────────────────────────────────────────
//

/// The per-(user, program, task) mutable state record.
///
/// Created implicitly the first time a user opens a task, overwritten in place
/// by submissions and review decisions, never deleted. `id` is `None` until
/// storage has assigned a row id.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskProgressRecord {
    pub id: Option<ProgressRecordId>,
    pub key: ProgressKey,
    pub status: TaskStatus,
    pub confirmation_status: ConfirmationStatus,
    pub uploaded_work_url: Option<ArtifactUrl>,
    pub comment: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TaskProgressRecord {
    /// A record as it looks before any user interaction.
    #[must_use]
    pub fn untouched(key: ProgressKey, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            key,
            status: TaskStatus::NotStarted,
            confirmation_status: ConfirmationStatus::None,
            uploaded_work_url: None,
            comment: None,
            updated_at: now,
        }
    }

    /// True when the record sits in the reviewable state: submitted work
    /// waiting on a verdict.
    #[must_use]
    pub fn is_reviewable(&self) -> bool {
        self.status == TaskStatus::Completed
            && self.confirmation_status == ConfirmationStatus::Pending
    }

    /// True when the submission has been accepted.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.confirmation_status == ConfirmationStatus::Accepted
    }

    /// Checks the record-local invariants:
    /// a confirmation gate other than `None` requires a completed task, and a
    /// reviewer comment requires a decision to have been made.
    ///
    /// # Errors
    ///
    /// Returns the violated invariant as a `ProgressError`.
    pub fn check_invariants(&self) -> Result<(), ProgressError> {
        if self.confirmation_status != ConfirmationStatus::None
            && self.status != TaskStatus::Completed
        {
            return Err(ProgressError::ConfirmationWithoutCompletion {
                status: self.status,
                confirmation: self.confirmation_status,
            });
        }
        if self.comment.is_some()
            && !matches!(
                self.confirmation_status,
                ConfirmationStatus::Accepted | ConfirmationStatus::Rejected
            )
        {
            return Err(ProgressError::CommentWithoutDecision);
        }
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn key() -> ProgressKey {
        ProgressKey::new(UserId::random(), ProgramId::new(1), TaskId::new(1))
    }

    #[test]
    fn status_roundtrips_canonical_strings() {
        for status in [
            TaskStatus::NotStarted,
            TaskStatus::InProgress,
            TaskStatus::Completed,
        ] {
            assert_eq!(TaskStatus::parse_str(status.as_str()).unwrap(), status);
        }
        assert!(TaskStatus::parse_str("rejected").is_err());
    }

    #[test]
    fn confirmation_parser_normalizes_acceptance_synonyms() {
        for spelling in ["accepted", "confirmed", "approved"] {
            assert_eq!(
                ConfirmationStatus::parse_str(spelling).unwrap(),
                ConfirmationStatus::Accepted
            );
        }
        // Only the canonical spelling is written back.
        assert_eq!(ConfirmationStatus::Accepted.as_str(), "accepted");
        assert!(ConfirmationStatus::parse_str("declined").is_err());
    }

    #[test]
    fn artifact_url_rejects_blank_and_garbage() {
        assert_eq!(
            ArtifactUrl::parse("   ").unwrap_err(),
            ProgressError::EmptyArtifactUrl
        );
        assert!(matches!(
            ArtifactUrl::parse("not a url").unwrap_err(),
            ProgressError::InvalidArtifactUrl(_)
        ));
        let ok = ArtifactUrl::parse("https://cdn.example/submissions/a.pdf").unwrap();
        assert_eq!(ok.as_str(), "https://cdn.example/submissions/a.pdf");
    }

    #[test]
    fn untouched_record_satisfies_invariants() {
        let record = TaskProgressRecord::untouched(key(), fixed_now());
        assert_eq!(record.status, TaskStatus::NotStarted);
        assert_eq!(record.confirmation_status, ConfirmationStatus::None);
        record.check_invariants().unwrap();
        assert!(!record.is_reviewable());
    }

    #[test]
    fn pending_confirmation_requires_completion() {
        let mut record = TaskProgressRecord::untouched(key(), fixed_now());
        record.confirmation_status = ConfirmationStatus::Pending;
        assert!(matches!(
            record.check_invariants().unwrap_err(),
            ProgressError::ConfirmationWithoutCompletion { .. }
        ));

        record.status = TaskStatus::Completed;
        record.check_invariants().unwrap();
        assert!(record.is_reviewable());
    }

    #[test]
    fn comment_requires_a_decision() {
        let mut record = TaskProgressRecord::untouched(key(), fixed_now());
        record.status = TaskStatus::Completed;
        record.confirmation_status = ConfirmationStatus::Pending;
        record.comment = Some("looks good".into());
        assert_eq!(
            record.check_invariants().unwrap_err(),
            ProgressError::CommentWithoutDecision
        );

        record.confirmation_status = ConfirmationStatus::Rejected;
        record.check_invariants().unwrap();
    }
}

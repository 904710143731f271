use async_trait::async_trait;
use chrono::{DateTime, Utc};
use progress_core::model::{
    ArtifactUrl, ConfirmationStatus, Program, ProgramId, ProgressKey, ProgressRecordId,
    TaskProgressRecord, TaskStatus, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── PROGRESS PATCH ────────────────────────────────────────────────────────────
//

/// Partial-field merge applied to one progress row.
///
/// `None` leaves the column untouched on update and falls back to the
/// untouched-record default on insert. The double-`Option` fields distinguish
/// "leave as is" from "set to null" for the nullable columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressPatch {
    pub status: Option<TaskStatus>,
    pub confirmation_status: Option<ConfirmationStatus>,
    pub uploaded_work_url: Option<Option<ArtifactUrl>>,
    pub comment: Option<Option<String>>,
}

impl ProgressPatch {
    /// True when the patch touches no column.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.confirmation_status.is_none()
            && self.uploaded_work_url.is_none()
            && self.comment.is_none()
    }

    /// Applies the patch to an in-memory record, refreshing `updated_at`.
    pub fn apply_to(&self, record: &mut TaskProgressRecord, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(confirmation) = self.confirmation_status {
            record.confirmation_status = confirmation;
        }
        if let Some(url) = &self.uploaded_work_url {
            record.uploaded_work_url = url.clone();
        }
        if let Some(comment) = &self.comment {
            record.comment = comment.clone();
        }
        record.updated_at = now;
    }
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

/// Repository contract for the per-(user, program, task) progress records.
///
/// `upsert` is the only way records come into existence: insert-or-update on
/// the unique key as one logical operation. There is deliberately no
/// insert/update pair — a separate existence check would reopen the same-key
/// race between near-simultaneous calls.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Insert or update the record for `key`, applying `patch` and refreshing
    /// `updated_at`. An absent row is the insert branch, not a failure.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write cannot be performed.
    async fn upsert(
        &self,
        key: &ProgressKey,
        patch: ProgressPatch,
        now: DateTime<Utc>,
    ) -> Result<TaskProgressRecord, StorageError>;

    /// Fetch the record for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a missing row is `Ok(None)`.
    async fn get(&self, key: &ProgressKey) -> Result<Option<TaskProgressRecord>, StorageError>;

    /// Fetch a record by its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_by_id(&self, id: ProgressRecordId) -> Result<TaskProgressRecord, StorageError>;

    /// Apply `patch` to an existing record addressed by row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn update_by_id(
        &self,
        id: ProgressRecordId,
        patch: ProgressPatch,
        now: DateTime<Utc>,
    ) -> Result<TaskProgressRecord, StorageError>;

    /// All records belonging to one user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_by_user(&self, user_id: UserId)
    -> Result<Vec<TaskProgressRecord>, StorageError>;

    /// All records within one program, across users.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_by_program(
        &self,
        program_id: ProgramId,
    ) -> Result<Vec<TaskProgressRecord>, StorageError>;

    /// The review queue: completed tasks whose submission awaits a verdict,
    /// oldest submission first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_pending(&self) -> Result<Vec<TaskProgressRecord>, StorageError>;
}

/// Repository contract for program and task definitions.
///
/// The definitions are owned by an external content-management collaborator;
/// `upsert_program` exists for seeding and tests.
#[async_trait]
pub trait ProgramRepository: Send + Sync {
    /// Persist or replace a program together with its tasks.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the program cannot be stored.
    async fn upsert_program(&self, program: &Program) -> Result<(), StorageError>;

    /// Fetch a program with its tasks in sequence order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_program(&self, id: ProgramId) -> Result<Program, StorageError>;

    /// All known programs.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_programs(&self) -> Result<Vec<Program>, StorageError>;
}

/// Contract for the submission artifact store.
///
/// Only two guarantees are contractual: paths passed to `put_object` are
/// unique enough not to collide, and the returned url stays valid for later
/// retrieval.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `path` and return an addressable url.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the object cannot be stored.
    async fn put_object(&self, path: &str, bytes: &[u8]) -> Result<ArtifactUrl, StorageError>;

    /// Fetch a previously stored object by the url `put_object` returned.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_object(&self, url: &ArtifactUrl) -> Result<Vec<u8>, StorageError>;
}

//
// ─── IN-MEMORY IMPLEMENTATION ──────────────────────────────────────────────────
//

#[derive(Default)]
struct ProgressTable {
    rows: HashMap<ProgressKey, TaskProgressRecord>,
    next_id: ProgressRecordId,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    programs: Arc<Mutex<HashMap<ProgramId, Program>>>,
    progress: Arc<Mutex<ProgressTable>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<T>(e: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn upsert(
        &self,
        key: &ProgressKey,
        patch: ProgressPatch,
        now: DateTime<Utc>,
    ) -> Result<TaskProgressRecord, StorageError> {
        let mut guard = self.progress.lock().map_err(lock_err)?;
        let ProgressTable { rows, next_id } = &mut *guard;
        let record = rows.entry(*key).or_insert_with(|| {
            *next_id += 1;
            let mut fresh = TaskProgressRecord::untouched(*key, now);
            fresh.id = Some(*next_id);
            fresh
        });
        patch.apply_to(record, now);
        Ok(record.clone())
    }

    async fn get(&self, key: &ProgressKey) -> Result<Option<TaskProgressRecord>, StorageError> {
        let guard = self.progress.lock().map_err(lock_err)?;
        Ok(guard.rows.get(key).cloned())
    }

    async fn get_by_id(&self, id: ProgressRecordId) -> Result<TaskProgressRecord, StorageError> {
        let guard = self.progress.lock().map_err(lock_err)?;
        guard
            .rows
            .values()
            .find(|r| r.id == Some(id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn update_by_id(
        &self,
        id: ProgressRecordId,
        patch: ProgressPatch,
        now: DateTime<Utc>,
    ) -> Result<TaskProgressRecord, StorageError> {
        let mut guard = self.progress.lock().map_err(lock_err)?;
        let record = guard
            .rows
            .values_mut()
            .find(|r| r.id == Some(id))
            .ok_or(StorageError::NotFound)?;
        patch.apply_to(record, now);
        Ok(record.clone())
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TaskProgressRecord>, StorageError> {
        let guard = self.progress.lock().map_err(lock_err)?;
        let mut records: Vec<TaskProgressRecord> = guard
            .rows
            .values()
            .filter(|r| r.key.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.key.program_id, r.key.task_id));
        Ok(records)
    }

    async fn list_by_program(
        &self,
        program_id: ProgramId,
    ) -> Result<Vec<TaskProgressRecord>, StorageError> {
        let guard = self.progress.lock().map_err(lock_err)?;
        let mut records: Vec<TaskProgressRecord> = guard
            .rows
            .values()
            .filter(|r| r.key.program_id == program_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.key.user_id, r.key.task_id));
        Ok(records)
    }

    async fn list_pending(&self) -> Result<Vec<TaskProgressRecord>, StorageError> {
        let guard = self.progress.lock().map_err(lock_err)?;
        let mut records: Vec<TaskProgressRecord> = guard
            .rows
            .values()
            .filter(|r| r.is_reviewable())
            .cloned()
            .collect();
        records.sort_by_key(|r| r.updated_at);
        Ok(records)
    }
}

#[async_trait]
impl ProgramRepository for InMemoryRepository {
    async fn upsert_program(&self, program: &Program) -> Result<(), StorageError> {
        let mut guard = self.programs.lock().map_err(lock_err)?;
        guard.insert(program.id(), program.clone());
        Ok(())
    }

    async fn get_program(&self, id: ProgramId) -> Result<Program, StorageError> {
        let guard = self.programs.lock().map_err(lock_err)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_programs(&self) -> Result<Vec<Program>, StorageError> {
        let guard = self.programs.lock().map_err(lock_err)?;
        let mut programs: Vec<Program> = guard.values().cloned().collect();
        programs.sort_by_key(Program::id);
        Ok(programs)
    }
}

/// In-memory artifact store keyed by upload path.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn url_for(path: &str) -> Result<ArtifactUrl, StorageError> {
        ArtifactUrl::parse(&format!("mem://submissions/{path}"))
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_object(&self, path: &str, bytes: &[u8]) -> Result<ArtifactUrl, StorageError> {
        let mut guard = self.objects.lock().map_err(lock_err)?;
        guard.insert(path.to_string(), bytes.to_vec());
        Self::url_for(path)
    }

    async fn get_object(&self, url: &ArtifactUrl) -> Result<Vec<u8>, StorageError> {
        let path = url
            .as_str()
            .strip_prefix("mem://submissions/")
            .ok_or(StorageError::NotFound)?;
        let guard = self.objects.lock().map_err(lock_err)?;
        guard.get(path).cloned().ok_or(StorageError::NotFound)
    }
}

//
// ─── STORAGE AGGREGATE ─────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub programs: Arc<dyn ProgramRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub objects: Arc<dyn ObjectStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let programs: Arc<dyn ProgramRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        let objects: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        Self {
            programs,
            progress,
            objects,
        }
    }
}

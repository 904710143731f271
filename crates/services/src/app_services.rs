use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::aggregator::ProgressAggregator;
use crate::confirmation::ConfirmationWorkflow;
use crate::enrollment::EnrollmentClient;
use crate::error::AppServicesError;
use crate::sync_loop::ProgressSyncService;
use crate::task_progress::TaskProgressService;

/// Assembles the progress services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    tasks: Arc<TaskProgressService>,
    confirmations: Arc<ConfirmationWorkflow>,
    aggregator: Arc<ProgressAggregator>,
    sync: Arc<ProgressSyncService>,
    enrollment: Arc<EnrollmentClient>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(clock, &storage))
    }

    /// Build services over in-memory storage, for tests and prototyping.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(clock, &Storage::in_memory())
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        let tasks = Arc::new(TaskProgressService::new(
            clock,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.objects),
        ));
        let confirmations = Arc::new(ConfirmationWorkflow::new(
            clock,
            Arc::clone(&storage.progress),
        ));
        let aggregator = Arc::new(ProgressAggregator::new(
            clock,
            Arc::clone(&storage.programs),
            Arc::clone(&storage.progress),
        ));
        let sync = Arc::new(ProgressSyncService::new(clock, Arc::clone(&aggregator)));
        let enrollment = Arc::new(EnrollmentClient::from_env());

        Self {
            tasks,
            confirmations,
            aggregator,
            sync,
            enrollment,
        }
    }

    #[must_use]
    pub fn tasks(&self) -> Arc<TaskProgressService> {
        Arc::clone(&self.tasks)
    }

    #[must_use]
    pub fn confirmations(&self) -> Arc<ConfirmationWorkflow> {
        Arc::clone(&self.confirmations)
    }

    #[must_use]
    pub fn aggregator(&self) -> Arc<ProgressAggregator> {
        Arc::clone(&self.aggregator)
    }

    #[must_use]
    pub fn sync(&self) -> Arc<ProgressSyncService> {
        Arc::clone(&self.sync)
    }

    #[must_use]
    pub fn enrollment(&self) -> Arc<EnrollmentClient> {
        Arc::clone(&self.enrollment)
    }
}

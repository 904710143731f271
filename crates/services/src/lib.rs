#![forbid(unsafe_code)]

pub mod aggregator;
pub mod app_services;
pub mod confirmation;
pub mod enrollment;
pub mod error;
pub mod sync_loop;
pub mod task_progress;

pub use progress_core::Clock;

pub use aggregator::{Certificate, ProgramOverviewItem, ProgressAggregator};
pub use app_services::AppServices;
pub use confirmation::{ConfirmationWorkflow, ReviewDecision};
pub use enrollment::{EnrollmentClient, EnrollmentConfig};
pub use error::{
    AggregationError, AppServicesError, ConfirmationError, EnrollmentError, TaskProgressError,
};
pub use sync_loop::{DEFAULT_SYNC_INTERVAL, ProgressSnapshot, ProgressSyncService, SyncState};
pub use task_progress::TaskProgressService;

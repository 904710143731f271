mod ids;
mod program;
mod progress;
mod view;

pub use ids::{ProgramId, ProgressRecordId, TaskId, UserId};

pub use program::{Program, ProgramError, Task};
pub use progress::{
    ArtifactUrl, ConfirmationStatus, ProgressError, ProgressKey, TaskProgressRecord, TaskStatus,
};
pub use view::{ProgramProgressView, ProgramStatus, sort_for_presentation};

use thiserror::Error;
use url::Url;

use crate::model::ids::{ProgramId, TaskId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgramError {
    #[error("program title cannot be empty")]
    EmptyTitle,

    #[error("task title cannot be empty")]
    EmptyTaskTitle,

    #[error("duplicate task id {0} in program")]
    DuplicateTaskId(TaskId),

    #[error("duplicate task position {0} in program")]
    DuplicatePosition(u32),

    #[error("task {task} belongs to program {expected}, not {found}")]
    ForeignTask {
        task: TaskId,
        expected: ProgramId,
        found: ProgramId,
    },
}

//
// ─── TASK ──────────────────────────────────────────────────────────────────────
//

/// One unit of assigned work inside a program.
///
/// Immutable from the core's perspective: definitions are owned by an external
/// content-management collaborator and only read here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    program_id: ProgramId,
    position: u32,
    title: String,
    material_url: Option<Url>,
}

impl Task {
    /// Creates a task definition.
    ///
    /// # Errors
    ///
    /// Returns `ProgramError::EmptyTaskTitle` if the title is blank.
    pub fn new(
        id: TaskId,
        program_id: ProgramId,
        position: u32,
        title: impl Into<String>,
        material_url: Option<Url>,
    ) -> Result<Self, ProgramError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ProgramError::EmptyTaskTitle);
        }
        Ok(Self {
            id,
            program_id,
            position,
            title,
            material_url,
        })
    }

    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[must_use]
    pub fn program_id(&self) -> ProgramId {
        self.program_id
    }

    /// 1-based sequence position inside the program.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Optional link to externally hosted task material.
    #[must_use]
    pub fn material_url(&self) -> Option<&Url> {
        self.material_url.as_ref()
    }
}

//
// ─── PROGRAM ───────────────────────────────────────────────────────────────────
//

/// A named, ordered set of tasks (a job simulation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    id: ProgramId,
    title: String,
    tasks: Vec<Task>,
}

impl Program {
    /// Creates a program from its task definitions.
    ///
    /// Tasks are re-sorted by position; ids and positions must be unique and
    /// every task must name this program.
    ///
    /// # Errors
    ///
    /// Returns `ProgramError` if the title is blank, a task belongs to a
    /// different program, or ids/positions collide.
    pub fn new(
        id: ProgramId,
        title: impl Into<String>,
        mut tasks: Vec<Task>,
    ) -> Result<Self, ProgramError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ProgramError::EmptyTitle);
        }

        tasks.sort_by_key(Task::position);
        for pair in tasks.windows(2) {
            if pair[0].position == pair[1].position {
                return Err(ProgramError::DuplicatePosition(pair[0].position));
            }
        }
        for (i, task) in tasks.iter().enumerate() {
            if task.program_id != id {
                return Err(ProgramError::ForeignTask {
                    task: task.id,
                    expected: id,
                    found: task.program_id,
                });
            }
            if tasks[..i].iter().any(|other| other.id == task.id) {
                return Err(ProgramError::DuplicateTaskId(task.id));
            }
        }

        Ok(Self { id, title, tasks })
    }

    #[must_use]
    pub fn id(&self) -> ProgramId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Tasks in sequence order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Task ids in sequence order.
    #[must_use]
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(Task::id).collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

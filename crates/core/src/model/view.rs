use crate::model::ids::{ProgramId, TaskId};
use crate::model::progress::{ConfirmationStatus, TaskProgressRecord, TaskStatus};

//
// ─── PROGRAM STATUS ────────────────────────────────────────────────────────────
//

/// Roll-up status of a whole program for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgramStatus {
    /// Rank used when listing several programs: active work first, finished
    /// next, untouched last. Presentation convenience only.
    #[must_use]
    fn presentation_rank(self) -> u8 {
        match self {
            ProgramStatus::InProgress => 0,
            ProgramStatus::Completed => 1,
            ProgramStatus::NotStarted => 2,
        }
    }
}

//
// ─── PROGRAM PROGRESS VIEW ─────────────────────────────────────────────────────
//

/// Derived, never stored: per-(user, program) aggregate over the task records.
///
/// This is intentionally **not** a UI view-model: no pre-formatted strings, no
/// locale assumptions. Consumers format as needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramProgressView {
    pub program_id: ProgramId,
    pub completed_count: usize,
    pub total_count: usize,
    pub percentage: u8,
    pub status: ProgramStatus,
    pub fully_approved: bool,
}

impl ProgramProgressView {
    /// Computes the aggregate from the program's task list and whatever
    /// records exist for the user.
    ///
    /// A task without a record counts as `NotStarted`; that is the normal
    /// state of an untouched task, never an error. Records for tasks outside
    /// `task_ids` are ignored.
    #[must_use]
    pub fn compute(
        program_id: ProgramId,
        task_ids: &[TaskId],
        records: &[TaskProgressRecord],
    ) -> Self {
        let record_for = |task_id: TaskId| {
            records
                .iter()
                .find(|r| r.key.program_id == program_id && r.key.task_id == task_id)
        };

        let total_count = task_ids.len();
        let mut completed_count = 0;
        let mut any_in_progress = false;
        let mut all_accepted = total_count > 0;

        for task_id in task_ids {
            let record = record_for(*task_id);
            let status = record.map_or(TaskStatus::NotStarted, |r| r.status);
            let confirmation = record.map_or(ConfirmationStatus::None, |r| r.confirmation_status);

            match status {
                TaskStatus::Completed => completed_count += 1,
                TaskStatus::InProgress => any_in_progress = true,
                TaskStatus::NotStarted => {}
            }
            if status != TaskStatus::Completed || confirmation != ConfirmationStatus::Accepted {
                all_accepted = false;
            }
        }

        let percentage = percentage(completed_count, total_count);
        let status = if total_count > 0 && completed_count == total_count {
            ProgramStatus::Completed
        } else if completed_count > 0 || any_in_progress {
            ProgramStatus::InProgress
        } else {
            ProgramStatus::NotStarted
        };

        Self {
            program_id,
            completed_count,
            total_count,
            percentage,
            status,
            fully_approved: all_accepted,
        }
    }
}

fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = (100.0 * completed as f64 / total as f64).round() as u8;
    pct
}

/// Stable presentation ordering over several program views: in-progress
/// first, then completed, then untouched. Ties keep input order.
pub fn sort_for_presentation<T>(items: &mut [T], status_of: impl Fn(&T) -> ProgramStatus) {
    items.sort_by_key(|item| status_of(item).presentation_rank());
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::progress::ProgressKey;
    use crate::model::{ArtifactUrl, UserId};
    use crate::time::fixed_now;

    fn record(
        user: UserId,
        program: u64,
        task: u64,
        status: TaskStatus,
        confirmation: ConfirmationStatus,
    ) -> TaskProgressRecord {
        let mut r = TaskProgressRecord::untouched(
            ProgressKey::new(user, ProgramId::new(program), TaskId::new(task)),
            fixed_now(),
        );
        r.status = status;
        r.confirmation_status = confirmation;
        if status == TaskStatus::Completed {
            r.uploaded_work_url = Some(ArtifactUrl::parse("https://cdn.example/work.pdf").unwrap());
        }
        r
    }

    fn task_ids(ids: &[u64]) -> Vec<TaskId> {
        ids.iter().copied().map(TaskId::new).collect()
    }

    #[test]
    fn two_of_three_completed_rounds_to_67() {
        // Task 1 accepted, task 2 pending review, task 3 untouched.
        let user = UserId::random();
        let records = vec![
            record(user, 1, 1, TaskStatus::Completed, ConfirmationStatus::Accepted),
            record(user, 1, 2, TaskStatus::Completed, ConfirmationStatus::Pending),
        ];

        let view = ProgramProgressView::compute(ProgramId::new(1), &task_ids(&[1, 2, 3]), &records);

        assert_eq!(view.completed_count, 2);
        assert_eq!(view.total_count, 3);
        assert_eq!(view.percentage, 67);
        assert_eq!(view.status, ProgramStatus::InProgress);
        assert!(!view.fully_approved);
    }

    #[test]
    fn all_accepted_is_completed_and_fully_approved() {
        let user = UserId::random();
        let records = vec![
            record(user, 1, 1, TaskStatus::Completed, ConfirmationStatus::Accepted),
            record(user, 1, 2, TaskStatus::Completed, ConfirmationStatus::Accepted),
            record(user, 1, 3, TaskStatus::Completed, ConfirmationStatus::Accepted),
        ];

        let view = ProgramProgressView::compute(ProgramId::new(1), &task_ids(&[1, 2, 3]), &records);

        assert_eq!(view.completed_count, 3);
        assert_eq!(view.percentage, 100);
        assert_eq!(view.status, ProgramStatus::Completed);
        assert!(view.fully_approved);
    }

    #[test]
    fn one_rejection_blocks_full_approval() {
        let user = UserId::random();
        let records = vec![
            record(user, 1, 1, TaskStatus::Completed, ConfirmationStatus::Accepted),
            record(user, 1, 2, TaskStatus::Completed, ConfirmationStatus::Rejected),
        ];

        let view = ProgramProgressView::compute(ProgramId::new(1), &task_ids(&[1, 2]), &records);

        // Both completed, so the roll-up says completed, but the certificate
        // gate stays closed.
        assert_eq!(view.status, ProgramStatus::Completed);
        assert!(!view.fully_approved);
    }

    #[test]
    fn in_progress_without_completions_counts_as_started() {
        let user = UserId::random();
        let records = vec![record(
            user,
            1,
            1,
            TaskStatus::InProgress,
            ConfirmationStatus::None,
        )];

        let view = ProgramProgressView::compute(ProgramId::new(1), &task_ids(&[1, 2]), &records);

        assert_eq!(view.status, ProgramStatus::InProgress);
        assert_eq!(view.percentage, 0);
    }

    #[test]
    fn empty_program_is_never_approved() {
        let view = ProgramProgressView::compute(ProgramId::new(1), &[], &[]);
        assert_eq!(view.percentage, 0);
        assert_eq!(view.status, ProgramStatus::NotStarted);
        assert!(!view.fully_approved);
    }

    #[test]
    fn records_from_other_programs_are_ignored() {
        let user = UserId::random();
        let records = vec![record(
            user,
            2,
            1,
            TaskStatus::Completed,
            ConfirmationStatus::Accepted,
        )];

        let view = ProgramProgressView::compute(ProgramId::new(1), &task_ids(&[1]), &records);
        assert_eq!(view.completed_count, 0);
        assert_eq!(view.status, ProgramStatus::NotStarted);
    }

    #[test]
    fn presentation_sort_puts_active_first_and_is_stable() {
        let mut statuses = vec![
            ("finished-a", ProgramStatus::Completed),
            ("untouched", ProgramStatus::NotStarted),
            ("active-a", ProgramStatus::InProgress),
            ("finished-b", ProgramStatus::Completed),
            ("active-b", ProgramStatus::InProgress),
        ];

        sort_for_presentation(&mut statuses, |(_, s)| *s);

        let names: Vec<&str> = statuses.iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec!["active-a", "active-b", "finished-a", "finished-b", "untouched"]
        );
    }
}

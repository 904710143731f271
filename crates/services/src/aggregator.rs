use std::sync::Arc;

use chrono::{DateTime, Utc};
use progress_core::model::{
    Program, ProgramId, ProgramProgressView, TaskProgressRecord, UserId, sort_for_presentation,
};
use storage::repository::{ProgramRepository, ProgressRepository, StorageError};

use crate::Clock;
use crate::error::AggregationError;

/// One program in a user's overview listing.
///
/// Presentation-agnostic: no pre-formatted strings, no locale assumptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramOverviewItem {
    pub program_id: ProgramId,
    pub title: String,
    pub view: ProgramProgressView,
}

/// Proof of a fully approved program, the input to certificate rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub user_id: UserId,
    pub program_id: ProgramId,
    pub program_title: String,
    pub issued_at: DateTime<Utc>,
}

/// Derives per-program roll-ups and the certificate gate from a user's
/// task records.
///
/// Purely a read path: records are fetched, the math happens in
/// `ProgramProgressView::compute`, nothing is written. Each task's record is
/// mutated independently elsewhere, so the roll-up is eventually consistent
/// across a program's task set by construction.
#[derive(Clone)]
pub struct ProgressAggregator {
    clock: Clock,
    programs: Arc<dyn ProgramRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressAggregator {
    #[must_use]
    pub fn new(
        clock: Clock,
        programs: Arc<dyn ProgramRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            programs,
            progress,
        }
    }

    /// The roll-up for one program.
    ///
    /// # Errors
    ///
    /// `UnknownProgram` if the program does not exist, `Storage` otherwise.
    pub async fn aggregate(
        &self,
        user: UserId,
        program_id: ProgramId,
    ) -> Result<ProgramProgressView, AggregationError> {
        let program = self.resolve_program(program_id).await?;
        let records = self.progress.list_by_user(user).await?;
        Ok(Self::view_of(&program, &records))
    }

    /// Roll-ups for every program the user has any record in, active work
    /// first.
    ///
    /// # Errors
    ///
    /// Returns `AggregationError::Storage` on repository failures.
    pub async fn overview(
        &self,
        user: UserId,
    ) -> Result<Vec<ProgramOverviewItem>, AggregationError> {
        let records = self.progress.list_by_user(user).await?;

        let mut program_ids: Vec<ProgramId> = Vec::new();
        for record in &records {
            if !program_ids.contains(&record.key.program_id) {
                program_ids.push(record.key.program_id);
            }
        }

        let mut items = Vec::with_capacity(program_ids.len());
        for program_id in program_ids {
            // Programs can leave the catalog; rows referencing them are
            // simply not shown.
            let program = match self.programs.get_program(program_id).await {
                Ok(program) => program,
                Err(StorageError::NotFound) => continue,
                Err(other) => return Err(other.into()),
            };
            items.push(ProgramOverviewItem {
                program_id,
                title: program.title().to_owned(),
                view: Self::view_of(&program, &records),
            });
        }

        sort_for_presentation(&mut items, |item| item.view.status);
        Ok(items)
    }

    /// Whether the user has earned the program's certificate.
    ///
    /// # Errors
    ///
    /// See `aggregate`.
    pub async fn certificate_eligible(
        &self,
        user: UserId,
        program_id: ProgramId,
    ) -> Result<bool, AggregationError> {
        Ok(self.aggregate(user, program_id).await?.fully_approved)
    }

    /// Issues the completion certificate for a fully approved program.
    ///
    /// # Errors
    ///
    /// `NotEligible` unless every task is completed and accepted; otherwise
    /// see `aggregate`.
    pub async fn issue_certificate(
        &self,
        user: UserId,
        program_id: ProgramId,
    ) -> Result<Certificate, AggregationError> {
        let program = self.resolve_program(program_id).await?;
        let records = self.progress.list_by_user(user).await?;
        let view = Self::view_of(&program, &records);

        if !view.fully_approved {
            return Err(AggregationError::NotEligible);
        }

        Ok(Certificate {
            user_id: user,
            program_id,
            program_title: program.title().to_owned(),
            issued_at: self.clock.now(),
        })
    }

    async fn resolve_program(&self, program_id: ProgramId) -> Result<Program, AggregationError> {
        match self.programs.get_program(program_id).await {
            Ok(program) => Ok(program),
            Err(StorageError::NotFound) => Err(AggregationError::UnknownProgram),
            Err(other) => Err(other.into()),
        }
    }

    fn view_of(program: &Program, records: &[TaskProgressRecord]) -> ProgramProgressView {
        ProgramProgressView::compute(program.id(), &program.task_ids(), records)
    }
}

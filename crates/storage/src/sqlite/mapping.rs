use progress_core::model::{
    ArtifactUrl, ConfirmationStatus, ProgramId, ProgressKey, TaskId, TaskProgressRecord,
    TaskStatus, UserId,
};
use sqlx::Row;

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn program_id_from_i64(v: i64) -> Result<ProgramId, StorageError> {
    Ok(ProgramId::new(i64_to_u64("program_id", v)?))
}

pub(crate) fn task_id_from_i64(v: i64) -> Result<TaskId, StorageError> {
    Ok(TaskId::new(i64_to_u64("task_id", v)?))
}

pub(crate) fn program_id_to_i64(id: ProgramId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("program_id overflow".into()))
}

pub(crate) fn task_id_to_i64(id: TaskId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("task_id overflow".into()))
}

pub(crate) fn user_id_from_str(s: &str) -> Result<UserId, StorageError> {
    s.parse::<UserId>()
        .map_err(|_| StorageError::Serialization(format!("invalid user_id: {s}")))
}

/// Maps one `task_progress` row into the domain record.
///
/// Confirmation statuses go through the core parser, which is where legacy
/// acceptance spellings (`confirmed`, `approved`) collapse into the canonical
/// variant.
pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<TaskProgressRecord, StorageError> {
    let user_id = user_id_from_str(&row.try_get::<String, _>("user_id").map_err(ser)?)?;
    let program_id = program_id_from_i64(row.try_get::<i64, _>("program_id").map_err(ser)?)?;
    let task_id = task_id_from_i64(row.try_get::<i64, _>("task_id").map_err(ser)?)?;

    let status_str: String = row.try_get("status").map_err(ser)?;
    let status = TaskStatus::parse_str(&status_str).map_err(ser)?;

    let confirmation_str: String = row.try_get("confirmation_status").map_err(ser)?;
    let confirmation_status = ConfirmationStatus::parse_str(&confirmation_str).map_err(ser)?;

    let uploaded_work_url = row
        .try_get::<Option<String>, _>("uploaded_work_url")
        .map_err(ser)?
        .map(|raw| ArtifactUrl::parse(&raw).map_err(ser))
        .transpose()?;

    Ok(TaskProgressRecord {
        id: Some(row.try_get("id").map_err(ser)?),
        key: ProgressKey::new(user_id, program_id, task_id),
        status,
        confirmation_status,
        uploaded_work_url,
        comment: row.try_get("comment").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_mapping_rejects_non_uuid() {
        assert!(matches!(
            user_id_from_str("user-7").unwrap_err(),
            StorageError::Serialization(_)
        ));
    }

    #[test]
    fn id_mapping_rejects_negative_values() {
        assert!(program_id_from_i64(-1).is_err());
        assert!(task_id_from_i64(-1).is_err());
    }
}

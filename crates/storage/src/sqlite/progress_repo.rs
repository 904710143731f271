use chrono::{DateTime, Utc};
use progress_core::model::{
    ProgramId, ProgressKey, ProgressRecordId, TaskProgressRecord, UserId,
};

use super::SqliteRepository;
use super::mapping::{map_progress_row, program_id_to_i64, task_id_to_i64};
use crate::repository::{ProgressPatch, ProgressRepository, StorageError};

const SELECT_COLUMNS: &str = r"
    SELECT id, user_id, program_id, task_id, status, confirmation_status,
           uploaded_work_url, comment, updated_at
    FROM task_progress
";

fn conn_err(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn upsert(
        &self,
        key: &ProgressKey,
        patch: ProgressPatch,
        now: DateTime<Utc>,
    ) -> Result<TaskProgressRecord, StorageError> {
        // One statement: the engine resolves same-key races, not the caller.
        // Only the patched columns appear in the conflict SET list, so a
        // decision write cannot clobber a racing submission's artifact url.
        let mut set_clauses = vec!["updated_at = excluded.updated_at"];
        if patch.status.is_some() {
            set_clauses.push("status = excluded.status");
        }
        if patch.confirmation_status.is_some() {
            set_clauses.push("confirmation_status = excluded.confirmation_status");
        }
        if patch.uploaded_work_url.is_some() {
            set_clauses.push("uploaded_work_url = excluded.uploaded_work_url");
        }
        if patch.comment.is_some() {
            set_clauses.push("comment = excluded.comment");
        }

        let sql = format!(
            r"
            INSERT INTO task_progress (
                user_id, program_id, task_id, status, confirmation_status,
                uploaded_work_url, comment, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(user_id, program_id, task_id) DO UPDATE SET {}
            ",
            set_clauses.join(", ")
        );

        // Insert-branch values: patched fields, untouched-record defaults
        // otherwise.
        let fresh = TaskProgressRecord::untouched(*key, now);
        let status = patch.status.unwrap_or(fresh.status);
        let confirmation = patch
            .confirmation_status
            .unwrap_or(fresh.confirmation_status);
        let url = patch
            .uploaded_work_url
            .clone()
            .flatten()
            .map(|u| u.as_str().to_owned());
        let comment = patch.comment.clone().flatten();

        sqlx::query(&sql)
            .bind(key.user_id.to_string())
            .bind(program_id_to_i64(key.program_id)?)
            .bind(task_id_to_i64(key.task_id)?)
            .bind(status.as_str())
            .bind(confirmation.as_str())
            .bind(url)
            .bind(comment)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(conn_err)?;

        self.get(key).await?.ok_or(StorageError::NotFound)
    }

    async fn get(&self, key: &ProgressKey) -> Result<Option<TaskProgressRecord>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE user_id = ?1 AND program_id = ?2 AND task_id = ?3");
        let row = sqlx::query(&sql)
            .bind(key.user_id.to_string())
            .bind(program_id_to_i64(key.program_id)?)
            .bind(task_id_to_i64(key.task_id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn_err)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn get_by_id(&self, id: ProgressRecordId) -> Result<TaskProgressRecord, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn_err)?;

        row.as_ref()
            .map(map_progress_row)
            .transpose()?
            .ok_or(StorageError::NotFound)
    }

    async fn update_by_id(
        &self,
        id: ProgressRecordId,
        patch: ProgressPatch,
        now: DateTime<Utc>,
    ) -> Result<TaskProgressRecord, StorageError> {
        let mut set_clauses = vec!["updated_at = ?1".to_string()];
        let mut next_placeholder = 2;
        let mut push = |column: &str, set_clauses: &mut Vec<String>| {
            set_clauses.push(format!("{column} = ?{next_placeholder}"));
            next_placeholder += 1;
        };
        if patch.status.is_some() {
            push("status", &mut set_clauses);
        }
        if patch.confirmation_status.is_some() {
            push("confirmation_status", &mut set_clauses);
        }
        if patch.uploaded_work_url.is_some() {
            push("uploaded_work_url", &mut set_clauses);
        }
        if patch.comment.is_some() {
            push("comment", &mut set_clauses);
        }
        let id_placeholder = next_placeholder;

        let sql = format!(
            "UPDATE task_progress SET {} WHERE id = ?{id_placeholder}",
            set_clauses.join(", ")
        );

        let mut q = sqlx::query(&sql).bind(now);
        if let Some(status) = patch.status {
            q = q.bind(status.as_str());
        }
        if let Some(confirmation) = patch.confirmation_status {
            q = q.bind(confirmation.as_str());
        }
        if let Some(url) = &patch.uploaded_work_url {
            q = q.bind(url.as_ref().map(|u| u.as_str().to_owned()));
        }
        if let Some(comment) = &patch.comment {
            q = q.bind(comment.clone());
        }

        let result = q.bind(id).execute(&self.pool).await.map_err(conn_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        self.get_by_id(id).await
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TaskProgressRecord>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY program_id, task_id");
        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(conn_err)?;

        rows.iter().map(map_progress_row).collect()
    }

    async fn list_by_program(
        &self,
        program_id: ProgramId,
    ) -> Result<Vec<TaskProgressRecord>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE program_id = ?1 ORDER BY user_id, task_id");
        let rows = sqlx::query(&sql)
            .bind(program_id_to_i64(program_id)?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn_err)?;

        rows.iter().map(map_progress_row).collect()
    }

    async fn list_pending(&self) -> Result<Vec<TaskProgressRecord>, StorageError> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE status = 'completed' AND confirmation_status = 'pending' \
             ORDER BY updated_at ASC"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(conn_err)?;

        rows.iter().map(map_progress_row).collect()
    }
}

use std::collections::HashMap;

use progress_core::model::{Program, ProgramId, Task};
use sqlx::Row;
use url::Url;

use super::mapping::{program_id_from_i64, program_id_to_i64, task_id_from_i64, task_id_to_i64};
use super::SqliteRepository;
use crate::repository::{ProgramRepository, StorageError};

fn conn_err(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn map_task_row(row: &sqlx::sqlite::SqliteRow) -> Result<Task, StorageError> {
    let material_url = row
        .try_get::<Option<String>, _>("material_url")
        .map_err(ser)?
        .map(|raw| Url::parse(&raw).map_err(ser))
        .transpose()?;

    let position_i64: i64 = row.try_get("position").map_err(ser)?;
    let position = u32::try_from(position_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid position: {position_i64}")))?;

    Task::new(
        task_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        program_id_from_i64(row.try_get::<i64, _>("program_id").map_err(ser)?)?,
        position,
        row.try_get::<String, _>("title").map_err(ser)?,
        material_url,
    )
    .map_err(ser)
}

#[async_trait::async_trait]
impl ProgramRepository for SqliteRepository {
    async fn upsert_program(&self, program: &Program) -> Result<(), StorageError> {
        let program_id = program_id_to_i64(program.id())?;
        let mut tx = self.pool.begin().await.map_err(conn_err)?;

        sqlx::query(
            r"
            INSERT INTO programs (id, title)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET title = excluded.title
            ",
        )
        .bind(program_id)
        .bind(program.title())
        .execute(&mut *tx)
        .await
        .map_err(conn_err)?;

        // Task definitions are replaced wholesale; progress rows reference
        // task ids and survive redefinition of titles/material.
        sqlx::query("DELETE FROM tasks WHERE program_id = ?1")
            .bind(program_id)
            .execute(&mut *tx)
            .await
            .map_err(conn_err)?;

        for task in program.tasks() {
            sqlx::query(
                r"
                INSERT INTO tasks (id, program_id, position, title, material_url)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(task_id_to_i64(task.id())?)
            .bind(program_id)
            .bind(i64::from(task.position()))
            .bind(task.title())
            .bind(task.material_url().map(Url::as_str))
            .execute(&mut *tx)
            .await
            .map_err(conn_err)?;
        }

        tx.commit().await.map_err(conn_err)
    }

    async fn get_program(&self, id: ProgramId) -> Result<Program, StorageError> {
        let program_id = program_id_to_i64(id)?;

        let program_row = sqlx::query("SELECT id, title FROM programs WHERE id = ?1")
            .bind(program_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn_err)?
            .ok_or(StorageError::NotFound)?;

        let task_rows = sqlx::query(
            r"
            SELECT id, program_id, position, title, material_url
            FROM tasks
            WHERE program_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(program_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;

        let tasks = task_rows
            .iter()
            .map(map_task_row)
            .collect::<Result<Vec<_>, _>>()?;

        Program::new(
            id,
            program_row.try_get::<String, _>("title").map_err(ser)?,
            tasks,
        )
        .map_err(ser)
    }

    async fn list_programs(&self) -> Result<Vec<Program>, StorageError> {
        let program_rows = sqlx::query("SELECT id, title FROM programs ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(conn_err)?;

        let task_rows = sqlx::query(
            r"
            SELECT id, program_id, position, title, material_url
            FROM tasks
            ORDER BY program_id ASC, position ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;

        let mut tasks_by_program: HashMap<ProgramId, Vec<Task>> = HashMap::new();
        for row in &task_rows {
            let task = map_task_row(row)?;
            tasks_by_program.entry(task.program_id()).or_default().push(task);
        }

        let mut programs = Vec::with_capacity(program_rows.len());
        for row in &program_rows {
            let id = program_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
            let title: String = row.try_get("title").map_err(ser)?;
            let tasks = tasks_by_program.remove(&id).unwrap_or_default();
            programs.push(Program::new(id, title, tasks).map_err(ser)?);
        }

        Ok(programs)
    }
}

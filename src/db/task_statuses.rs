//! Task status CRUD operations.

use super::{Database, is_unique_violation, now_ms, referenced_by_tasks};
use crate::error::ApiError;
use crate::patch::apply_patch;
use crate::types::{TaskStatus, TaskStatusCreate};
use crate::updates::TaskStatusPatch;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

fn parse_status_row(row: &Row) -> rusqlite::Result<TaskStatus> {
    Ok(TaskStatus {
        id: row.get("id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        created_at: row.get("created_at")?,
    })
}

pub(crate) fn get_status_internal(conn: &Connection, status_id: i64) -> Result<Option<TaskStatus>> {
    let status = conn
        .query_row(
            "SELECT id, name, slug, created_at FROM task_statuses WHERE id = ?1",
            params![status_id],
            parse_status_row,
        )
        .optional()?;
    Ok(status)
}

pub(crate) fn get_status_by_slug_internal(
    conn: &Connection,
    slug: &str,
) -> Result<Option<TaskStatus>> {
    let status = conn
        .query_row(
            "SELECT id, name, slug, created_at FROM task_statuses WHERE slug = ?1",
            params![slug],
            parse_status_row,
        )
        .optional()?;
    Ok(status)
}

fn map_slug_conflict(err: rusqlite::Error, slug: &str) -> anyhow::Error {
    if is_unique_violation(&err) {
        ApiError::already_exists("slug", slug).into()
    } else {
        err.into()
    }
}

impl Database {
    pub fn create_status(&self, input: &TaskStatusCreate) -> Result<TaskStatus> {
        input.validate()?;
        let now = now_ms();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO task_statuses (name, slug, created_at) VALUES (?1, ?2, ?3)",
                params![input.name, input.slug, now],
            )
            .map_err(|e| map_slug_conflict(e, &input.slug))?;

            Ok(TaskStatus {
                id: conn.last_insert_rowid(),
                name: input.name.clone(),
                slug: input.slug.clone(),
                created_at: now,
            })
        })
    }

    pub fn get_status(&self, status_id: i64) -> Result<Option<TaskStatus>> {
        self.with_conn(|conn| get_status_internal(conn, status_id))
    }

    /// Get a status by ID, failing with `EntityNotFound`.
    pub fn require_status(&self, status_id: i64) -> Result<TaskStatus> {
        self.get_status(status_id)?
            .ok_or_else(|| ApiError::entity_not_found("Task status", status_id).into())
    }

    pub fn get_status_by_slug(&self, slug: &str) -> Result<Option<TaskStatus>> {
        self.with_conn(|conn| get_status_by_slug_internal(conn, slug))
    }

    pub fn list_statuses(&self) -> Result<Vec<TaskStatus>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, slug, created_at FROM task_statuses ORDER BY id")?;
            let statuses = stmt
                .query_map([], parse_status_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(statuses)
        })
    }

    /// Rename a status or change its slug. Tasks follow the status by ID,
    /// so a new slug is visible on every task using it.
    pub fn update_status(&self, status_id: i64, patch: TaskStatusPatch) -> Result<TaskStatus> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let status = get_status_internal(&tx, status_id)?
                .ok_or_else(|| ApiError::entity_not_found("Task status", status_id))?;
            let updated = apply_patch(patch, status)?;

            tx.execute(
                "UPDATE task_statuses SET name = ?1, slug = ?2 WHERE id = ?3",
                params![updated.name, updated.slug, status_id],
            )
            .map_err(|e| map_slug_conflict(e, &updated.slug))?;

            tx.commit()?;
            Ok(updated)
        })
    }

    /// Delete a status. Fails with `InUse` while any task has it.
    pub fn delete_status(&self, status_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            if referenced_by_tasks(conn, "SELECT 1 FROM tasks WHERE status_id = ?1", status_id)? {
                return Err(ApiError::in_use("Task status", status_id).into());
            }

            let deleted =
                conn.execute("DELETE FROM task_statuses WHERE id = ?1", params![status_id])?;
            if deleted == 0 {
                return Err(ApiError::entity_not_found("Task status", status_id).into());
            }
            Ok(())
        })
    }
}

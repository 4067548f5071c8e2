//! Label CRUD operations.

use super::{Database, is_unique_violation, now_ms, referenced_by_tasks};
use crate::error::ApiError;
use crate::patch::apply_patch;
use crate::types::{Label, LabelCreate};
use crate::updates::LabelPatch;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

fn parse_label_row(row: &Row) -> rusqlite::Result<Label> {
    Ok(Label {
        id: row.get("id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
    })
}

pub(crate) fn get_label_internal(conn: &Connection, label_id: i64) -> Result<Option<Label>> {
    let label = conn
        .query_row(
            "SELECT id, name, created_at FROM labels WHERE id = ?1",
            params![label_id],
            parse_label_row,
        )
        .optional()?;
    Ok(label)
}

fn map_name_conflict(err: rusqlite::Error, name: &str) -> anyhow::Error {
    if is_unique_violation(&err) {
        ApiError::already_exists("name", name).into()
    } else {
        err.into()
    }
}

impl Database {
    pub fn create_label(&self, input: &LabelCreate) -> Result<Label> {
        input.validate()?;
        let now = now_ms();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO labels (name, created_at) VALUES (?1, ?2)",
                params![input.name, now],
            )
            .map_err(|e| map_name_conflict(e, &input.name))?;

            Ok(Label {
                id: conn.last_insert_rowid(),
                name: input.name.clone(),
                created_at: now,
            })
        })
    }

    pub fn get_label(&self, label_id: i64) -> Result<Option<Label>> {
        self.with_conn(|conn| get_label_internal(conn, label_id))
    }

    pub fn require_label(&self, label_id: i64) -> Result<Label> {
        self.get_label(label_id)?
            .ok_or_else(|| ApiError::entity_not_found("Label", label_id).into())
    }

    pub fn get_label_by_name(&self, name: &str) -> Result<Option<Label>> {
        self.with_conn(|conn| {
            let label = conn
                .query_row(
                    "SELECT id, name, created_at FROM labels WHERE name = ?1",
                    params![name],
                    parse_label_row,
                )
                .optional()?;
            Ok(label)
        })
    }

    pub fn list_labels(&self) -> Result<Vec<Label>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, created_at FROM labels ORDER BY id")?;
            let labels = stmt
                .query_map([], parse_label_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(labels)
        })
    }

    pub fn update_label(&self, label_id: i64, patch: LabelPatch) -> Result<Label> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let label = get_label_internal(&tx, label_id)?
                .ok_or_else(|| ApiError::entity_not_found("Label", label_id))?;
            let updated = apply_patch(patch, label)?;

            tx.execute(
                "UPDATE labels SET name = ?1 WHERE id = ?2",
                params![updated.name, label_id],
            )
            .map_err(|e| map_name_conflict(e, &updated.name))?;

            tx.commit()?;
            Ok(updated)
        })
    }

    /// Delete a label. Fails with `InUse` while any task carries it.
    pub fn delete_label(&self, label_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            if referenced_by_tasks(
                conn,
                "SELECT 1 FROM task_labels WHERE label_id = ?1",
                label_id,
            )? {
                return Err(ApiError::in_use("Label", label_id).into());
            }

            let deleted = conn.execute("DELETE FROM labels WHERE id = ?1", params![label_id])?;
            if deleted == 0 {
                return Err(ApiError::entity_not_found("Label", label_id).into());
            }
            Ok(())
        })
    }
}

//! Task CRUD and filtered listing.

use super::{Database, now_ms};
use crate::error::ApiError;
use crate::filter::Predicate;
use crate::patch::apply_patch;
use crate::types::{Task, TaskCreate};
use crate::updates::TaskPatch;
use anyhow::Result;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::collections::BTreeSet;

/// Task columns with the status slug and the label ids as a JSON array.
const TASK_SELECT: &str = "SELECT t.id, t.idx, t.title, t.content, s.slug AS status,
        t.assignee_id, t.created_at,
        (SELECT json_group_array(tl.label_id) FROM task_labels tl WHERE tl.task_id = t.id)
            AS label_ids
    FROM tasks t
    JOIN task_statuses s ON s.id = t.status_id";

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let label_ids_json: String = row.get("label_ids")?;
    let label_ids: BTreeSet<i64> = serde_json::from_str(&label_ids_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(Task {
        id: row.get("id")?,
        index: row.get("idx")?,
        title: row.get("title")?,
        content: row.get("content")?,
        status: row.get("status")?,
        assignee_id: row.get("assignee_id")?,
        label_ids,
        created_at: row.get("created_at")?,
    })
}

/// Render a predicate as a SQL condition over `tasks t JOIN task_statuses s`.
/// Bound values are appended to `params` in placeholder order.
pub fn predicate_sql(predicate: &Predicate, params: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::True => "1".to_string(),
        Predicate::TitleContains(needle) => {
            // lower_unicode is registered on every connection, see db::register_functions
            params.push(Value::Text(needle.clone()));
            "instr(lower_unicode(t.title), lower_unicode(?)) > 0".to_string()
        }
        Predicate::AssigneeIs(id) => {
            params.push(Value::Integer(*id));
            "t.assignee_id = ?".to_string()
        }
        Predicate::StatusIs(slug) => {
            params.push(Value::Text(slug.clone()));
            "s.slug = ?".to_string()
        }
        Predicate::HasLabel(id) => {
            params.push(Value::Integer(*id));
            "EXISTS (SELECT 1 FROM task_labels m WHERE m.task_id = t.id AND m.label_id = ?)"
                .to_string()
        }
        Predicate::And(all) => {
            let parts: Vec<String> = all.iter().map(|p| predicate_sql(p, params)).collect();
            format!("({})", parts.join(" AND "))
        }
    }
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
fn get_task_internal(conn: &Connection, task_id: i64) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            &format!("{TASK_SELECT} WHERE t.id = ?1"),
            params![task_id],
            parse_task_row,
        )
        .optional()?;
    Ok(task)
}

/// Replace the label set of a task in the junction table.
fn sync_task_labels(conn: &Connection, task_id: i64, label_ids: &BTreeSet<i64>) -> Result<()> {
    conn.execute("DELETE FROM task_labels WHERE task_id = ?1", params![task_id])?;
    for label_id in label_ids {
        conn.execute(
            "INSERT INTO task_labels (task_id, label_id) VALUES (?1, ?2)",
            params![task_id, label_id],
        )?;
    }
    Ok(())
}

impl Database {
    /// Create a task. Assignee, status and labels must all exist.
    pub fn create_task(&self, input: TaskCreate) -> Result<Task> {
        input.validate()?;
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let resolved = TaskPatch::from(input).resolve(&*tx)?;
            let blank = Task {
                id: 0,
                index: None,
                title: String::new(),
                content: None,
                status: String::new(),
                assignee_id: None,
                label_ids: BTreeSet::new(),
                created_at: now,
            };
            let mut task = apply_patch(resolved, blank)?;

            tx.execute(
                "INSERT INTO tasks (idx, title, content, status_id, assignee_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, (SELECT id FROM task_statuses WHERE slug = ?4), ?5, ?6, ?7)",
                params![
                    task.index,
                    task.title,
                    task.content,
                    task.status,
                    task.assignee_id,
                    now,
                    now
                ],
            )?;
            task.id = tx.last_insert_rowid();
            sync_task_labels(&tx, task.id, &task.label_ids)?;

            tx.commit()?;
            tracing::debug!(task_id = task.id, "Created task");
            Ok(task)
        })
    }

    /// Get a task by ID.
    pub fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// Get a task by ID, failing with `EntityNotFound`.
    pub fn require_task(&self, task_id: i64) -> Result<Task> {
        self.get_task(task_id)?
            .ok_or_else(|| ApiError::entity_not_found("Task", task_id).into())
    }

    /// List every task ordered by ID.
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        self.find_tasks_matching(&Predicate::True)
    }

    /// Execute a composed filter predicate and return matching tasks by ID.
    pub fn find_tasks_matching(&self, predicate: &Predicate) -> Result<Vec<Task>> {
        let mut bound = Vec::new();
        let condition = predicate_sql(predicate, &mut bound);
        let sql = format!("{TASK_SELECT} WHERE {condition} ORDER BY t.id");

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params_from_iter(bound.iter()), parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    /// Apply a partial update to a task.
    ///
    /// Load, reference resolution and save share one transaction. If any
    /// present reference fails to resolve nothing is written.
    pub fn update_task(&self, task_id: i64, patch: TaskPatch) -> Result<Task> {
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| ApiError::entity_not_found("Task", task_id))?;
            let resolved = patch.resolve(&*tx)?;
            let labels_changed = resolved.label_ids.is_present();
            let updated = apply_patch(resolved, task)?;

            tx.execute(
                "UPDATE tasks SET
                    idx = ?1, title = ?2, content = ?3,
                    status_id = (SELECT id FROM task_statuses WHERE slug = ?4),
                    assignee_id = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    updated.index,
                    updated.title,
                    updated.content,
                    updated.status,
                    updated.assignee_id,
                    now,
                    task_id
                ],
            )?;
            if labels_changed {
                sync_task_labels(&tx, task_id, &updated.label_ids)?;
            }

            tx.commit()?;
            Ok(updated)
        })
    }

    /// Delete a task and its label links.
    pub fn delete_task(&self, task_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            if deleted == 0 {
                return Err(ApiError::entity_not_found("Task", task_id).into());
            }
            Ok(())
        })
    }
}

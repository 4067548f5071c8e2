//! User CRUD operations.

use super::{Database, is_unique_violation, now_ms, referenced_by_tasks};
use crate::error::ApiError;
use crate::patch::apply_patch;
use crate::types::{User, UserCreate};
use crate::updates::UserChanges;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_digest, created_at";

pub fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        email: row.get("email")?,
        password_digest: row.get("password_digest")?,
        created_at: row.get("created_at")?,
    })
}

/// Internal helper to get a user using an existing connection (avoids deadlock).
pub(crate) fn get_user_internal(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![user_id],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

fn map_email_conflict(err: rusqlite::Error, email: &str) -> anyhow::Error {
    if is_unique_violation(&err) {
        ApiError::already_exists("email", email).into()
    } else {
        err.into()
    }
}

impl Database {
    /// Create a user. The password must already be hashed.
    pub fn create_user(&self, input: &UserCreate, password_digest: &str) -> Result<User> {
        let now = now_ms();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (first_name, last_name, email, password_digest, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    input.first_name,
                    input.last_name,
                    input.email,
                    password_digest,
                    now,
                    now
                ],
            )
            .map_err(|e| map_email_conflict(e, &input.email))?;

            Ok(User {
                id: conn.last_insert_rowid(),
                first_name: input.first_name.clone(),
                last_name: input.last_name.clone(),
                email: input.email.clone(),
                password_digest: password_digest.to_string(),
                created_at: now,
            })
        })
    }

    /// Get a user by ID.
    pub fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| get_user_internal(conn, user_id))
    }

    /// Get a user by ID, failing with `EntityNotFound`.
    pub fn require_user(&self, user_id: i64) -> Result<User> {
        self.get_user(user_id)?
            .ok_or_else(|| ApiError::entity_not_found("User", user_id).into())
    }

    /// Get a user by email (login name).
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                    params![email],
                    parse_user_row,
                )
                .optional()?;
            Ok(user)
        })
    }

    /// List all users ordered by ID.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
            let users = stmt
                .query_map([], parse_user_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }

    /// Merge prepared changes onto a stored user.
    pub fn update_user(&self, user_id: i64, changes: UserChanges) -> Result<User> {
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let user = get_user_internal(&tx, user_id)?
                .ok_or_else(|| ApiError::entity_not_found("User", user_id))?;
            let updated = apply_patch(changes, user)?;

            tx.execute(
                "UPDATE users SET first_name = ?1, last_name = ?2, email = ?3,
                    password_digest = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    updated.first_name,
                    updated.last_name,
                    updated.email,
                    updated.password_digest,
                    now,
                    user_id
                ],
            )
            .map_err(|e| map_email_conflict(e, &updated.email))?;

            tx.commit()?;
            Ok(updated)
        })
    }

    /// Delete a user. Fails with `InUse` while tasks are assigned to them.
    pub fn delete_user(&self, user_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            if referenced_by_tasks(conn, "SELECT 1 FROM tasks WHERE assignee_id = ?1", user_id)? {
                return Err(ApiError::in_use("User", user_id).into());
            }

            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
            if deleted == 0 {
                return Err(ApiError::entity_not_found("User", user_id).into());
            }
            Ok(())
        })
    }
}

//! Login sessions backing bearer tokens.

use super::users::parse_user_row;
use super::{Database, now_ms};
use crate::types::User;
use anyhow::Result;
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

impl Database {
    /// Issue a new opaque token for `user_id`, valid for `ttl_seconds`.
    pub fn create_session(&self, user_id: i64, ttl_seconds: i64) -> Result<String> {
        let token = Uuid::new_v4().simple().to_string();
        let now = now_ms();
        let expires_at = now.saturating_add(ttl_seconds.saturating_mul(1000));

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![token, user_id, now, expires_at],
            )?;
            Ok(())
        })?;

        Ok(token)
    }

    /// Resolve a token to its user. Unknown or expired tokens give `None`.
    pub fn user_for_token(&self, token: &str) -> Result<Option<User>> {
        let now = now_ms();

        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT u.id, u.first_name, u.last_name, u.email, u.password_digest, u.created_at
                     FROM sessions s JOIN users u ON u.id = s.user_id
                     WHERE s.token = ?1 AND s.expires_at > ?2",
                    params![token, now],
                    parse_user_row,
                )
                .optional()?;
            Ok(user)
        })
    }

    /// Drop a single session (logout).
    pub fn delete_session(&self, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
            Ok(deleted > 0)
        })
    }

    /// Remove expired sessions. Returns the number removed.
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let now = now_ms();
        self.with_conn(|conn| {
            let purged = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
            Ok(purged)
        })
    }
}

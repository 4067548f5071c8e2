//! Database layer for the task manager.

pub mod labels;
pub mod seed;
pub mod sessions;
pub mod task_statuses;
pub mod tasks;
pub mod users;

use crate::filter::fold_case;
use crate::types::{Label, TaskStatus, User};
use crate::updates::ReferenceResolver;
use anyhow::{Result, anyhow};
use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Register SQL functions used by task queries.
///
/// `lower_unicode(text)` applies the same case folding as
/// [`Predicate::matches`](crate::filter::Predicate::matches); SQLite's
/// built-in `lower()` only folds ASCII.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "lower_unicode",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| fold_case(&t)))
        },
    )?;
    Ok(())
}

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for concurrent access
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;
        register_functions(&conn)?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        register_functions(&conn)?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations.
    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.lock()?;
        let report = embedded::migrations::runner().run(&mut *conn)?;
        for migration in report.applied_migrations() {
            tracing::info!(version = migration.version(), name = %migration.name(), "Applied migration");
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Execute a function with mutable access to the connection (for transactions).
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.lock()?;
        f(&mut conn)
    }
}

/// Get the current timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// True when the error is a UNIQUE constraint failure.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Whether any task row matches `sql` (an `EXISTS` subquery body) for `id`.
pub(crate) fn referenced_by_tasks(conn: &Connection, sql: &str, id: i64) -> Result<bool> {
    let exists: bool = conn.query_row(
        &format!("SELECT EXISTS({})", sql),
        rusqlite::params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

// Lookups run on whatever connection or transaction the caller already holds.
impl ReferenceResolver for Connection {
    fn resolve_user(&self, id: i64) -> Result<Option<User>> {
        users::get_user_internal(self, id)
    }

    fn resolve_status(&self, slug: &str) -> Result<Option<TaskStatus>> {
        task_statuses::get_status_by_slug_internal(self, slug)
    }

    fn resolve_label(&self, id: i64) -> Result<Option<Label>> {
        labels::get_label_internal(self, id)
    }
}

impl ReferenceResolver for Database {
    fn resolve_user(&self, id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| conn.resolve_user(id))
    }

    fn resolve_status(&self, slug: &str) -> Result<Option<TaskStatus>> {
        self.with_conn(|conn| conn.resolve_status(slug))
    }

    fn resolve_label(&self, id: i64) -> Result<Option<Label>> {
        self.with_conn(|conn| conn.resolve_label(id))
    }
}

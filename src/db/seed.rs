//! Startup reference data.

use super::{Database, now_ms};
use crate::config::SeedConfig;
use crate::types::status_name_from_slug;
use anyhow::Result;
use rusqlite::params;

/// Rows written by a seeding run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub admin_created: bool,
    pub statuses_created: usize,
    pub labels_created: usize,
}

impl Database {
    /// Insert the admin user, default statuses and default labels when
    /// missing. Existing rows are left untouched, so this can run on every
    /// startup. `hash` is only called when the admin must be created.
    pub fn seed_defaults<H>(&self, seed: &SeedConfig, hash: H) -> Result<SeedReport>
    where
        H: FnOnce(&str) -> Result<String>,
    {
        let mut report = SeedReport::default();
        let now = now_ms();

        if self.get_user_by_email(&seed.admin_email)?.is_none() {
            let digest = hash(&seed.admin_password)?;
            report.admin_created = self.with_conn(|conn| {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO users (email, password_digest, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![seed.admin_email, digest, now, now],
                )?;
                Ok(inserted > 0)
            })?;
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            for slug in &seed.statuses {
                report.statuses_created += tx.execute(
                    "INSERT OR IGNORE INTO task_statuses (name, slug, created_at) VALUES (?1, ?2, ?3)",
                    params![status_name_from_slug(slug), slug, now],
                )?;
            }

            for name in &seed.labels {
                report.labels_created += tx.execute(
                    "INSERT OR IGNORE INTO labels (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
            }

            tx.commit()?;
            Ok(())
        })?;

        tracing::info!(
            admin_created = report.admin_created,
            statuses = report.statuses_created,
            labels = report.labels_created,
            "Seeded reference data"
        );
        Ok(report)
    }
}

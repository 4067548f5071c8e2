//! Configuration loading and management.
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. YAML file: explicit path, else `./task-manager/config.yaml`, else
//!    `~/.task-manager/config.yaml`
//! 3. Environment variables (`TASK_MANAGER_DB_PATH`, `TASK_MANAGER_BIND`,
//!    `TASK_MANAGER_PORT`, `TASK_MANAGER_TOKEN_TTL`)
//!
//! CLI flags are applied on top by `main`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_DB_PATH: &str = "TASK_MANAGER_DB_PATH";
pub const ENV_BIND: &str = "TASK_MANAGER_BIND";
pub const ENV_PORT: &str = "TASK_MANAGER_PORT";
pub const ENV_TOKEN_TTL: &str = "TASK_MANAGER_TOKEN_TTL";

/// Upper bound for `auth.token_ttl_seconds` (one year).
pub const MAX_TOKEN_TTL_SECONDS: i64 = 365 * 86_400;

const CONFIG_FILE: &str = "config.yaml";
const PROJECT_DIR: &str = "task-manager";
const USER_DIR: &str = ".task-manager";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value {value:?} for environment variable {var}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("invalid value {value} for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub seed: SeedConfig,
}

/// HTTP listener and storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".task-manager/tasks.db")
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Token and password hashing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of a login token.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: i64,

    /// bcrypt work factor.
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_seconds: default_token_ttl(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

fn default_token_ttl() -> i64 {
    86_400 // 24 hours
}

fn token_ttl_in_range(secs: i64) -> bool {
    (1..=MAX_TOKEN_TTL_SECONDS).contains(&secs)
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

/// Reference data written on startup when missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_admin_email")]
    pub admin_email: String,

    #[serde(default = "default_admin_password")]
    pub admin_password: String,

    /// Status slugs; display names are derived from the slug.
    #[serde(default = "default_statuses")]
    pub statuses: Vec<String>,

    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            admin_email: default_admin_email(),
            admin_password: default_admin_password(),
            statuses: default_statuses(),
            labels: default_labels(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_admin_email() -> String {
    "hexlet@example.com".to_string()
}

fn default_admin_password() -> String {
    "qwerty".to_string()
}

fn default_statuses() -> Vec<String> {
    ["draft", "to_review", "to_be_fixed", "to_publish", "published"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_labels() -> Vec<String> {
    vec!["feature".to_string(), "bug".to_string()]
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ttl = self.auth.token_ttl_seconds;
        if !token_ttl_in_range(ttl) {
            return Err(ConfigError::InvalidValue {
                field: "auth.token_ttl_seconds",
                value: ttl.to_string(),
                reason: format!("must be between 1 and {MAX_TOKEN_TTL_SECONDS}"),
            });
        }
        Ok(())
    }

    /// Candidate config files in search order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(PROJECT_DIR).join(CONFIG_FILE)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(USER_DIR).join(CONFIG_FILE));
        }
        paths
    }

    /// Load from an explicit path, or the first existing default location,
    /// or defaults; then apply environment overrides.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match Self::search_paths().into_iter().find(|p| p.is_file()) {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "Loading config file");
                    Self::load(path)?
                }
                None => Self::default(),
            },
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(db_path) = lookup(ENV_DB_PATH) {
            self.server.db_path = PathBuf::from(db_path);
        }

        if let Some(bind) = lookup(ENV_BIND) {
            self.server.bind = bind;
        }

        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_PORT,
                value: port.clone(),
            })?;
        }

        if let Some(ttl) = lookup(ENV_TOKEN_TTL) {
            self.auth.token_ttl_seconds = ttl
                .parse()
                .ok()
                .filter(|secs: &i64| token_ttl_in_range(*secs))
                .ok_or_else(|| ConfigError::InvalidEnv {
                    var: ENV_TOKEN_TTL,
                    value: ttl.clone(),
                })?;
        }

        Ok(())
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> std::io::Result<()> {
        if let Some(parent) = self.server.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

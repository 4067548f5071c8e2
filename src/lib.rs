//! Task Manager Library
//!
//! Users, task statuses, labels and tasks behind an HTTP API, with tri-state
//! partial updates and composable task filters.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod logging;
pub mod patch;
pub mod types;
pub mod updates;
pub mod validate;

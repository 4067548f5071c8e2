//! Core entity and wire types.

use crate::error::ApiResult;
use crate::validate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Format a millisecond timestamp as `YYYY-MM-DD` (UTC).
pub fn format_date(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

// =============================================================================
// Users
// =============================================================================

/// A registered user. The password digest never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub password_digest: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub created_at: String,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            created_at: format_date(user.created_at),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub email: String,
    pub password: String,
}

impl UserCreate {
    pub fn validate(&self) -> ApiResult<()> {
        validate::email("email", &self.email)?;
        validate::password("password", &self.password)
    }
}

/// Credentials posted to `/api/login`. `username` is the user's email.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// =============================================================================
// Task statuses
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusDto {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: String,
}

impl From<&TaskStatus> for TaskStatusDto {
    fn from(status: &TaskStatus) -> Self {
        Self {
            id: status.id,
            name: status.name.clone(),
            slug: status.slug.clone(),
            created_at: format_date(status.created_at),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatusCreate {
    pub name: String,
    pub slug: String,
}

impl TaskStatusCreate {
    pub fn validate(&self) -> ApiResult<()> {
        validate::non_blank("name", &self.name)?;
        validate::non_blank("slug", &self.slug)
    }
}

/// Display name for a status slug: `to_review` becomes `To review`.
pub fn status_name_from_slug(slug: &str) -> String {
    let mut words = slug.split('_').filter(|w| !w.is_empty());
    let Some(first) = words.next() else {
        return String::new();
    };
    let mut chars = first.chars();
    let mut name: String = match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    for word in words {
        name.push(' ');
        name.push_str(word);
    }
    name
}

// =============================================================================
// Labels
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LabelDto {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

impl From<&Label> for LabelDto {
    fn from(label: &Label) -> Self {
        Self {
            id: label.id,
            name: label.name.clone(),
            created_at: format_date(label.created_at),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelCreate {
    pub name: String,
}

impl LabelCreate {
    pub fn validate(&self) -> ApiResult<()> {
        validate::label_name("name", &self.name)
    }
}

// =============================================================================
// Tasks
// =============================================================================

/// A task. `status` holds the slug of its task status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub index: Option<i64>,
    pub title: String,
    pub content: Option<String>,
    pub status: String,
    pub assignee_id: Option<i64>,
    pub label_ids: BTreeSet<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskDto {
    pub id: i64,
    pub index: Option<i64>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub assignee_id: Option<i64>,
    pub title: String,
    pub content: Option<String>,
    pub status: String,
    #[serde(rename = "taskLabelIds")]
    pub task_label_ids: Vec<i64>,
}

impl From<&Task> for TaskDto {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            index: task.index,
            created_at: format_date(task.created_at),
            assignee_id: task.assignee_id,
            title: task.title.clone(),
            content: task.content.clone(),
            status: task.status.clone(),
            task_label_ids: task.label_ids.iter().copied().collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskCreate {
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub assignee_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    pub status: String,
    #[serde(default, rename = "taskLabelIds")]
    pub task_label_ids: Option<Vec<i64>>,
}

impl TaskCreate {
    pub fn validate(&self) -> ApiResult<()> {
        validate::non_blank("title", &self.title)?;
        validate::non_blank("status", &self.status)
    }
}

//! Partial-update payloads for every entity.
//!
//! Each payload is decoded straight from the request body into `Patch`
//! fields. Payloads that carry secrets or relationships go through a
//! preparation step first: `UserPatch` hashes a present password into
//! `UserChanges`, and `TaskPatch` resolves present identifiers into
//! `ResolvedTaskPatch`. Only the prepared form is applied to a record.

use crate::error::{ApiError, ApiResult};
use crate::patch::{ApplyPatch, Patch};
use crate::types::{Label, Task, TaskCreate, TaskStatus, User};
use crate::validate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Looks up entities referenced from a task.
pub trait ReferenceResolver {
    fn resolve_user(&self, id: i64) -> anyhow::Result<Option<User>>;
    fn resolve_status(&self, slug: &str) -> anyhow::Result<Option<TaskStatus>>;
    fn resolve_label(&self, id: i64) -> anyhow::Result<Option<Label>>;
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub first_name: Patch<Option<String>>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub last_name: Patch<Option<String>>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub email: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub password: Patch<String>,
}

impl UserPatch {
    pub fn validate(&self) -> ApiResult<()> {
        if let Patch::Present(email) = &self.email {
            validate::email("email", email)?;
        }
        if let Patch::Present(password) = &self.password {
            validate::password("password", password)?;
        }
        Ok(())
    }

    /// Validate and hash a present password. An absent password leaves the
    /// stored digest alone.
    pub fn prepare<H>(self, hash: H) -> ApiResult<UserChanges>
    where
        H: FnOnce(&str) -> ApiResult<String>,
    {
        self.validate()?;
        Ok(UserChanges {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_digest: self.password.try_map(|p| hash(&p))?,
        })
    }
}

/// A validated user patch with the password already hashed.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Patch<Option<String>>,
    pub last_name: Patch<Option<String>>,
    pub email: Patch<String>,
    pub password_digest: Patch<String>,
}

impl ApplyPatch<User> for UserChanges {
    fn apply_to(self, record: &mut User) {
        self.first_name.apply_to(&mut record.first_name);
        self.last_name.apply_to(&mut record.last_name);
        self.email.apply_to(&mut record.email);
        self.password_digest.apply_to(&mut record.password_digest);
    }

    fn is_empty(&self) -> bool {
        self.first_name.is_absent()
            && self.last_name.is_absent()
            && self.email.is_absent()
            && self.password_digest.is_absent()
    }
}

// =============================================================================
// Task statuses
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskStatusPatch {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub name: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub slug: Patch<String>,
}

impl ApplyPatch<TaskStatus> for TaskStatusPatch {
    fn validate(&self) -> ApiResult<()> {
        if let Patch::Present(name) = &self.name {
            validate::non_blank("name", name)?;
        }
        if let Patch::Present(slug) = &self.slug {
            validate::non_blank("slug", slug)?;
        }
        Ok(())
    }

    fn apply_to(self, record: &mut TaskStatus) {
        self.name.apply_to(&mut record.name);
        self.slug.apply_to(&mut record.slug);
    }

    fn is_empty(&self) -> bool {
        self.name.is_absent() && self.slug.is_absent()
    }
}

// =============================================================================
// Labels
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelPatch {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub name: Patch<String>,
}

impl ApplyPatch<Label> for LabelPatch {
    fn validate(&self) -> ApiResult<()> {
        if let Patch::Present(name) = &self.name {
            validate::label_name("name", name)?;
        }
        Ok(())
    }

    fn apply_to(self, record: &mut Label) {
        self.name.apply_to(&mut record.name);
    }

    fn is_empty(&self) -> bool {
        self.name.is_absent()
    }
}

// =============================================================================
// Tasks
// =============================================================================

/// Task update payload as received.
///
/// `assignee_id: null` unassigns the task. `status` is a status slug and
/// `taskLabelIds` replaces the whole label set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub index: Patch<Option<i64>>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub assignee_id: Patch<Option<i64>>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub title: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub content: Patch<Option<String>>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub status: Patch<String>,
    #[serde(
        default,
        rename = "taskLabelIds",
        skip_serializing_if = "Patch::is_absent"
    )]
    pub task_label_ids: Patch<Vec<i64>>,
}

impl TaskPatch {
    pub fn validate(&self) -> ApiResult<()> {
        if let Patch::Present(title) = &self.title {
            validate::non_blank("title", title)?;
        }
        if let Patch::Present(status) = &self.status {
            validate::non_blank("status", status)?;
        }
        Ok(())
    }

    /// Validate the payload and resolve every present relationship.
    ///
    /// Absent relationship fields are never looked up. Any identifier that
    /// does not resolve rejects the whole patch with `ReferenceNotFound`.
    pub fn resolve<R>(self, resolver: &R) -> ApiResult<ResolvedTaskPatch>
    where
        R: ReferenceResolver + ?Sized,
    {
        self.validate()?;

        let assignee_id = self
            .assignee_id
            .try_map(|assignee| -> ApiResult<Option<i64>> {
                let Some(id) = assignee else {
                    return Ok(None);
                };
                resolver
                    .resolve_user(id)?
                    .map(|user| Some(user.id))
                    .ok_or_else(|| ApiError::reference_not_found("assignee_id", "user", id))
            })?;

        let status = self.status.try_map(|slug| -> ApiResult<String> {
            resolver
                .resolve_status(&slug)?
                .map(|status| status.slug)
                .ok_or_else(|| ApiError::reference_not_found("status", "task status", &slug))
        })?;

        let label_ids = self
            .task_label_ids
            .try_map(|ids| -> ApiResult<BTreeSet<i64>> {
                let mut resolved = BTreeSet::new();
                for id in ids {
                    let label = resolver.resolve_label(id)?.ok_or_else(|| {
                        ApiError::reference_not_found("taskLabelIds", "label", id)
                    })?;
                    resolved.insert(label.id);
                }
                Ok(resolved)
            })?;

        Ok(ResolvedTaskPatch {
            index: self.index,
            assignee_id,
            title: self.title,
            content: self.content,
            status,
            label_ids,
        })
    }
}

impl From<TaskCreate> for TaskPatch {
    /// Every field of a create request is present; missing optionals become
    /// explicit nulls or an empty label set.
    fn from(create: TaskCreate) -> Self {
        Self {
            index: Patch::Present(create.index),
            assignee_id: Patch::Present(create.assignee_id),
            title: Patch::Present(create.title),
            content: Patch::Present(create.content),
            status: Patch::Present(create.status),
            task_label_ids: Patch::Present(create.task_label_ids.unwrap_or_default()),
        }
    }
}

/// A task patch whose relationship identifiers are known to exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTaskPatch {
    pub index: Patch<Option<i64>>,
    pub assignee_id: Patch<Option<i64>>,
    pub title: Patch<String>,
    pub content: Patch<Option<String>>,
    pub status: Patch<String>,
    pub label_ids: Patch<BTreeSet<i64>>,
}

impl ApplyPatch<Task> for ResolvedTaskPatch {
    fn apply_to(self, record: &mut Task) {
        self.index.apply_to(&mut record.index);
        self.assignee_id.apply_to(&mut record.assignee_id);
        self.title.apply_to(&mut record.title);
        self.content.apply_to(&mut record.content);
        self.status.apply_to(&mut record.status);
        self.label_ids.apply_to(&mut record.label_ids);
    }

    fn is_empty(&self) -> bool {
        self.index.is_absent()
            && self.assignee_id.is_absent()
            && self.title.is_absent()
            && self.content.is_absent()
            && self.status.is_absent()
            && self.label_ids.is_absent()
    }
}

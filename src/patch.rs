//! Tri-state patch values and the patch applier.
//!
//! A field in an update payload is either absent (the key was not sent) or
//! present with a value. When the value type is itself nullable
//! (`Patch<Option<T>>`), `Present(None)` means "clear this field" and is
//! distinct from `Absent`, which means "leave this field alone".
//!
//! Payload structs declare their fields as:
//!
//! ```ignore
//! #[serde(default, skip_serializing_if = "Patch::is_absent")]
//! pub content: Patch<Option<String>>,
//! ```
//!
//! so a missing key decodes to `Absent` and `null` decodes to
//! `Present(None)`.

use crate::error::ApiResult;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single field of a partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    /// The key was not part of the request.
    Absent,
    /// The key was sent with this value.
    Present(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Absent
    }
}

impl<T> Patch<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Patch::Present(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }

    /// Borrow the present value.
    ///
    /// # Panics
    ///
    /// Panics when the field is absent. Check [`Patch::is_present`] first or
    /// use [`Patch::as_ref`]/[`Patch::into_option`].
    #[track_caller]
    pub fn get(&self) -> &T {
        match self {
            Patch::Present(value) => value,
            Patch::Absent => panic!("Patch::get called on an absent field"),
        }
    }

    pub fn as_ref(&self) -> Patch<&T> {
        match self {
            Patch::Present(value) => Patch::Present(value),
            Patch::Absent => Patch::Absent,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Patch::Present(value) => Some(value),
            Patch::Absent => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Patch<U> {
        match self {
            Patch::Present(value) => Patch::Present(f(value)),
            Patch::Absent => Patch::Absent,
        }
    }

    /// Like [`Patch::map`] for fallible conversions. Absent stays absent.
    pub fn try_map<U, E, F: FnOnce(T) -> Result<U, E>>(self, f: F) -> Result<Patch<U>, E> {
        match self {
            Patch::Present(value) => f(value).map(Patch::Present),
            Patch::Absent => Ok(Patch::Absent),
        }
    }

    /// Overwrite `target` when present. Returns whether a write happened.
    pub fn apply_to(self, target: &mut T) -> bool {
        match self {
            Patch::Present(value) => {
                *target = value;
                true
            }
            Patch::Absent => false,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Only reached when the key exists; missing keys use Default.
        T::deserialize(deserializer).map(Patch::Present)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Patch::Present(value) => value.serialize(serializer),
            Patch::Absent => serializer.serialize_none(),
        }
    }
}

/// A partial update that can be merged onto a record of type `R`.
pub trait ApplyPatch<R> {
    /// Check present values against the record's invariants.
    fn validate(&self) -> ApiResult<()> {
        Ok(())
    }

    /// Copy every present field onto `record`. Absent fields are untouched.
    fn apply_to(self, record: &mut R);

    /// True when no field is present.
    fn is_empty(&self) -> bool;
}

/// Validate `patch` and merge it onto `record`.
///
/// Validation runs before any field is written, so on error the caller's
/// record is dropped untouched and nothing should be persisted.
pub fn apply_patch<P, R>(patch: P, mut record: R) -> ApiResult<R>
where
    P: ApplyPatch<R>,
{
    patch.validate()?;
    patch.apply_to(&mut record);
    Ok(record)
}

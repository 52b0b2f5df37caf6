//! Before/after pairs expressing insert, update and delete uniformly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content::ContentObject;
use crate::error::{Result, SyncError};
use crate::handle::ContentHandle;

/// The write operation a tuple expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(old, new)` pair; at least one side is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentTuple {
    old: Option<ContentObject>,
    new: Option<ContentObject>,
}

impl ContentTuple {
    /// Build a tuple.
    ///
    /// # Errors
    /// Returns `EmptyTuple` when both sides are absent.
    pub fn new(old: Option<ContentObject>, new: Option<ContentObject>) -> Result<Self> {
        if old.is_none() && new.is_none() {
            return Err(SyncError::EmptyTuple);
        }
        Ok(Self { old, new })
    }

    #[must_use]
    pub fn insert(new: ContentObject) -> Self {
        Self {
            old: None,
            new: Some(new),
        }
    }

    #[must_use]
    pub fn update(old: ContentObject, new: ContentObject) -> Self {
        Self {
            old: Some(old),
            new: Some(new),
        }
    }

    #[must_use]
    pub fn delete(old: ContentObject) -> Self {
        Self {
            old: Some(old),
            new: None,
        }
    }

    #[must_use]
    pub fn old(&self) -> Option<&ContentObject> {
        self.old.as_ref()
    }

    #[must_use]
    pub fn new_object(&self) -> Option<&ContentObject> {
        self.new.as_ref()
    }

    #[must_use]
    pub fn is_insert(&self) -> bool {
        self.old.is_none()
    }

    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.new.is_none()
    }

    #[must_use]
    pub fn is_update(&self) -> bool {
        self.old.is_some() && self.new.is_some()
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        match (&self.old, &self.new) {
            (None, _) => Operation::Insert,
            (Some(_), None) => Operation::Delete,
            (Some(_), Some(_)) => Operation::Update,
        }
    }

    /// The object to write: `new` when present, otherwise `old`.
    #[must_use]
    pub fn write_object(&self) -> &ContentObject {
        match (&self.new, &self.old) {
            (Some(new), _) => new,
            (None, Some(old)) => old,
            // Construction guarantees one side is present.
            (None, None) => unreachable!("content tuple without objects"),
        }
    }

    #[must_use]
    pub fn handle(&self) -> &ContentHandle {
        self.write_object().handle()
    }

    #[must_use]
    pub fn into_parts(self) -> (Option<ContentObject>, Option<ContentObject>) {
        (self.old, self.new)
    }
}

//! Content handles: dual identifiers for content objects.
//!
//! A handle names one content object within one content type through a
//! human-readable *path key* (`/shared/reports/sales`), an opaque *object id*
//! assigned by a store, or both. Different stores expose different halves,
//! so equality is defined over whichever half both sides carry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{PATH_SEPARATOR, REFERENCE_ID_SEPARATOR};
use crate::error::{Result, SyncError};

/// Tag naming a kind of content (e.g. "report", "schedule").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentType(String);

impl ContentType {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Identifies one content item within one content type.
///
/// `PartialEq` is strict handle equality: content types must match, path
/// keys are compared when both sides have one, otherwise object ids are
/// compared. Handles that share no identifier half are never equal. This
/// relation is not transitive, so `ContentHandle` deliberately has no `Eq`
/// or `Hash`; use [`ContentHandle::identity`] for hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentHandle {
    content_type: ContentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

impl ContentHandle {
    /// Create an unset handle for a content type.
    #[must_use]
    pub fn new(content_type: impl Into<ContentType>) -> Self {
        Self {
            content_type: content_type.into(),
            key: None,
            id: None,
        }
    }

    /// Create a handle addressed by path key.
    #[must_use]
    pub fn with_key(content_type: impl Into<ContentType>, key: impl Into<String>) -> Self {
        Self::new(content_type).key(key)
    }

    /// Create a handle addressed by object id.
    #[must_use]
    pub fn with_id(content_type: impl Into<ContentType>, id: impl Into<String>) -> Self {
        Self::new(content_type).id(id)
    }

    /// Derive the handle of a child item: `parent_key + "/" + local_name`.
    ///
    /// Returns a handle without key when the parent has no key.
    #[must_use]
    pub fn child_of(
        parent: &ContentHandle,
        content_type: impl Into<ContentType>,
        local_name: &str,
    ) -> Self {
        let mut handle = Self::new(content_type);
        handle.key = parent
            .key
            .as_deref()
            .map(|parent_key| format!("{parent_key}{PATH_SEPARATOR}{local_name}"));
        handle
    }

    /// Set the path key (builder style).
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the object id (builder style).
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    #[must_use]
    pub fn path_key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_path_key(&mut self, key: Option<String>) {
        self.key = key;
    }

    pub fn set_object_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    /// A handle is set when it carries at least one identifier.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.key.is_some() || self.id.is_some()
    }

    /// A handle is resolved when it carries both identifiers.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.key.is_some() && self.id.is_some()
    }

    /// Last segment of the path key.
    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        self.key
            .as_deref()
            .map(|key| key.rsplit(PATH_SEPARATOR).next().unwrap_or(key))
    }

    /// Path key of the parent, when the key has more than one segment.
    #[must_use]
    pub fn parent_key(&self) -> Option<&str> {
        let key = self.key.as_deref()?;
        let (parent, _) = key.rsplit_once(PATH_SEPARATOR)?;
        (!parent.is_empty()).then_some(parent)
    }

    /// Strict equality: same content type, then key if both have one, else id.
    #[must_use]
    pub fn matches(&self, other: &ContentHandle) -> bool {
        self.content_type == other.content_type && self.same_identifier(other)
    }

    /// Best-effort equality across stores: ignores the content type and
    /// accepts a match on either identifier.
    #[must_use]
    pub fn matches_key_or_id(&self, other: &ContentHandle) -> bool {
        let key_match = matches!((&self.key, &other.key), (Some(a), Some(b)) if a == b);
        let id_match = matches!((&self.id, &other.id), (Some(a), Some(b)) if a == b);
        key_match || id_match
    }

    fn same_identifier(&self, other: &ContentHandle) -> bool {
        match (&self.key, &other.key) {
            (Some(a), Some(b)) => a == b,
            _ => matches!((&self.id, &other.id), (Some(a), Some(b)) if a == b),
        }
    }

    /// Overwrite both identifiers with those of `other`.
    ///
    /// # Errors
    /// Returns `HandleTypeMismatch` when the content types differ.
    pub fn copy_from(&mut self, other: &ContentHandle) -> Result<()> {
        self.ensure_same_type(other)?;
        self.key.clone_from(&other.key);
        self.id.clone_from(&other.id);
        Ok(())
    }

    /// Fill in identifier halves this handle lacks from `other`.
    ///
    /// Returns `true` when anything changed.
    ///
    /// # Errors
    /// Returns `HandleTypeMismatch` when the content types differ.
    pub fn fill_missing(&mut self, other: &ContentHandle) -> Result<bool> {
        self.ensure_same_type(other)?;
        let mut changed = false;
        if self.key.is_none() && other.key.is_some() {
            self.key.clone_from(&other.key);
            changed = true;
        }
        if self.id.is_none() && other.id.is_some() {
            self.id.clone_from(&other.id);
            changed = true;
        }
        Ok(changed)
    }

    pub(crate) fn ensure_same_type(&self, other: &ContentHandle) -> Result<()> {
        if self.content_type == other.content_type {
            Ok(())
        } else {
            Err(SyncError::HandleTypeMismatch {
                expected: self.content_type.to_string(),
                actual: other.content_type.to_string(),
            })
        }
    }

    /// Hashable identity, preferring the path key over the object id.
    #[must_use]
    pub fn identity(&self) -> Option<HandleIdentity> {
        let identifier = match (&self.key, &self.id) {
            (Some(key), _) => Identifier::Key(key.clone()),
            (None, Some(id)) => Identifier::Id(id.clone()),
            (None, None) => return None,
        };
        Some(HandleIdentity {
            content_type: self.content_type.clone(),
            identifier,
        })
    }

    /// Serialize the identifiers as `key`, `#id` or `key#id`.
    #[must_use]
    pub fn to_reference(&self) -> String {
        match (&self.key, &self.id) {
            (Some(key), Some(id)) => format!("{key}{REFERENCE_ID_SEPARATOR}{id}"),
            (Some(key), None) => key.clone(),
            (None, Some(id)) => format!("{REFERENCE_ID_SEPARATOR}{id}"),
            (None, None) => String::new(),
        }
    }

    /// Parse a reference produced by [`ContentHandle::to_reference`].
    ///
    /// # Errors
    /// Returns `UnsetHandle` when neither identifier is present.
    pub fn parse_reference(content_type: impl Into<ContentType>, text: &str) -> Result<Self> {
        let mut handle = Self::new(content_type);
        let (key, id) = match text.rsplit_once(REFERENCE_ID_SEPARATOR) {
            Some((key, id)) => (key, Some(id)),
            None => (text, None),
        };
        if !key.is_empty() {
            handle.key = Some(key.to_string());
        }
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            handle.id = Some(id.to_string());
        }
        if handle.is_set() {
            Ok(handle)
        } else {
            Err(SyncError::UnsetHandle(handle.content_type.to_string()))
        }
    }
}

impl PartialEq for ContentHandle {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl fmt::Display for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.content_type, self.to_reference())
    }
}

/// Which identifier a [`HandleIdentity`] was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    Key(String),
    Id(String),
}

/// Hashable form of a handle, used as dependency graph node key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleIdentity {
    pub content_type: ContentType,
    pub identifier: Identifier,
}

impl HandleIdentity {
    /// Handle carrying only the identifier this identity was built from.
    #[must_use]
    pub fn to_handle(&self) -> ContentHandle {
        match &self.identifier {
            Identifier::Key(key) => ContentHandle::with_key(self.content_type.clone(), key.clone()),
            Identifier::Id(id) => ContentHandle::with_id(self.content_type.clone(), id.clone()),
        }
    }
}

impl fmt::Display for HandleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Identifier::Key(key) => write!(f, "{}:{key}", self.content_type),
            Identifier::Id(id) => write!(f, "{}:{REFERENCE_ID_SEPARATOR}{id}", self.content_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_set() {
        assert!(!ContentHandle::new("report").is_set());
        assert!(ContentHandle::with_key("report", "/a").is_set());
        assert!(ContentHandle::with_id("report", "42").is_set());
        assert!(ContentHandle::with_key("report", "/a").id("42").is_resolved());
    }

    #[test]
    fn test_equality_prefers_key() {
        let a = ContentHandle::with_key("report", "/a").id("1");
        let b = ContentHandle::with_key("report", "/a").id("2");
        let c = ContentHandle::with_key("report", "/b").id("1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_equality_falls_back_to_id() {
        let a = ContentHandle::with_key("report", "/a").id("1");
        let b = ContentHandle::with_id("report", "1");
        assert_eq!(a, b);
        assert_ne!(ContentHandle::with_key("report", "/a"), ContentHandle::with_id("report", "1"));
    }

    #[test]
    fn test_equality_requires_type() {
        let a = ContentHandle::with_key("report", "/a");
        let b = ContentHandle::with_key("schedule", "/a");
        assert_ne!(a, b);
        assert!(a.matches_key_or_id(&b));
    }

    #[test]
    fn test_child_of() {
        let parent = ContentHandle::with_key("folder", "/shared/sales");
        let child = ContentHandle::child_of(&parent, "report", "q1");
        assert_eq!(child.path_key(), Some("/shared/sales/q1"));
        assert_eq!(child.local_name(), Some("q1"));
        assert_eq!(child.parent_key(), Some("/shared/sales"));
    }

    #[test]
    fn test_parent_key_of_root_segment() {
        assert_eq!(ContentHandle::with_key("folder", "/shared").parent_key(), None);
        assert_eq!(ContentHandle::with_key("folder", "shared").parent_key(), None);
    }

    #[test]
    fn test_copy_from_type_mismatch() {
        let mut a = ContentHandle::with_key("report", "/a");
        let b = ContentHandle::with_key("schedule", "/b");
        let err = a.copy_from(&b).unwrap_err();
        assert!(matches!(err, SyncError::HandleTypeMismatch { .. }));
    }

    #[test]
    fn test_fill_missing() {
        let mut a = ContentHandle::with_key("report", "/a");
        let b = ContentHandle::with_key("report", "/other").id("7");
        assert!(a.fill_missing(&b).unwrap());
        assert_eq!(a.path_key(), Some("/a"));
        assert_eq!(a.object_id(), Some("7"));
        assert!(!a.fill_missing(&b).unwrap());
    }

    #[test]
    fn test_reference_parse() {
        let h = ContentHandle::parse_reference("report", "/a/b#12").unwrap();
        assert_eq!(h.path_key(), Some("/a/b"));
        assert_eq!(h.object_id(), Some("12"));

        let h = ContentHandle::parse_reference("report", "#12").unwrap();
        assert_eq!(h.path_key(), None);
        assert_eq!(h.object_id(), Some("12"));

        assert!(ContentHandle::parse_reference("report", "").is_err());
    }

    #[test]
    fn test_identity_prefers_key() {
        let h = ContentHandle::with_key("report", "/a").id("1");
        let identity = h.identity().unwrap();
        assert_eq!(identity.identifier, Identifier::Key("/a".to_string()));
        assert_eq!(identity.to_string(), "report:/a");
        assert!(ContentHandle::new("report").identity().is_none());
    }
}

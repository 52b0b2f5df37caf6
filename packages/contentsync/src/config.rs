//! Configuration constants, validation and run configuration.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Result, SyncError};

/// Bean table name under which the object being (un)marshalled is bound.
pub const ROOT_BEAN: &str = "root";

/// Bean table name under which a content tuple is bound for update documents.
pub const TUPLE_BEAN: &str = "tuple";

/// Child element name that receives the tuple's old object.
pub const TUPLE_OLD: &str = "old";

/// Child element name that receives the tuple's new object.
pub const TUPLE_NEW: &str = "new";

/// Separator between segments of a path key.
pub const PATH_SEPARATOR: char = '/';

/// Separator between path key and object id in a serialized handle reference.
pub const REFERENCE_ID_SEPARATOR: char = '#';

/// Maximum number of content objects accepted in one run.
///
/// Ordering is quadratic in the number of objects.
pub const MAX_OBJECTS_PER_RUN: usize = 50_000;

/// Path key pattern: one or more non-empty segments, optionally rooted.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static PATH_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/?[^/#]+(/[^/#]+)*$").expect("valid regex"));

/// Validate the format of a path key.
///
/// # Examples
/// ```
/// use contentsync::config::validate_path_key;
///
/// assert!(validate_path_key("/shared/reports/sales").is_ok());
/// assert!(validate_path_key("folder//report").is_err());
/// assert!(validate_path_key("report#1").is_err());
/// ```
pub fn validate_path_key(key: &str) -> Result<()> {
    if PATH_KEY_PATTERN.is_match(key) {
        Ok(())
    } else {
        Err(SyncError::InvalidPathKey(key.to_string()))
    }
}

/// Run configuration for the synchronization driver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Abort the run on the first per-item error instead of collecting it.
    pub halt_on_error: bool,
    /// Delete destination objects that no longer exist in the source.
    pub delete_missing: bool,
    /// Upper bound on objects read in one run.
    pub max_objects: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            halt_on_error: false,
            delete_missing: false,
            max_objects: MAX_OBJECTS_PER_RUN,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from `CONTENTSYNC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = env_flag("CONTENTSYNC_HALT_ON_ERROR")? {
            config.halt_on_error = value;
        }
        if let Some(value) = env_flag("CONTENTSYNC_DELETE_MISSING")? {
            config.delete_missing = value;
        }
        if let Ok(raw) = std::env::var("CONTENTSYNC_MAX_OBJECTS") {
            config.max_objects = raw.parse().map_err(|_| {
                SyncError::Config(format!("CONTENTSYNC_MAX_OBJECTS is not a number: {raw}"))
            })?;
        }

        Ok(config)
    }

    /// Parse a YAML configuration document. Missing fields keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn with_halt_on_error(mut self, halt: bool) -> Self {
        self.halt_on_error = halt;
        self
    }

    pub fn with_delete_missing(mut self, delete: bool) -> Self {
        self.delete_missing = delete;
        self
    }

    pub fn with_max_objects(mut self, max_objects: usize) -> Self {
        self.max_objects = max_objects;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_objects == 0 {
            return Err(SyncError::Config("max_objects must be at least 1".into()));
        }
        Ok(())
    }
}

fn env_flag(name: &str) -> Result<Option<bool>> {
    match std::env::var(name) {
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(SyncError::Config(format!("{name} is not a boolean: {raw}"))),
        },
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_path_key_valid() {
        assert!(validate_path_key("report").is_ok());
        assert!(validate_path_key("/shared/report").is_ok());
        assert!(validate_path_key("shared/sub folder/report.xdo").is_ok());
    }

    #[test]
    fn test_validate_path_key_invalid() {
        assert!(validate_path_key("").is_err());
        assert!(validate_path_key("/").is_err());
        assert!(validate_path_key("a//b").is_err());
        assert!(validate_path_key("a/b/").is_err());
        assert!(validate_path_key("a#b").is_err());
    }

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.halt_on_error);
        assert!(!config.delete_missing);
        assert_eq!(config.max_objects, MAX_OBJECTS_PER_RUN);
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = SyncConfig::from_yaml_str("halt_on_error: true\n").unwrap();
        assert!(config.halt_on_error);
        assert!(!config.delete_missing);
    }

    #[test]
    fn test_from_yaml_rejects_unknown_field() {
        assert!(SyncConfig::from_yaml_str("halt: true\n").is_err());
    }

    #[test]
    fn test_from_yaml_rejects_zero_max_objects() {
        let err = SyncConfig::from_yaml_str("max_objects: 0\n").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "delete_missing: true\nmax_objects: 10").unwrap();

        let config = SyncConfig::from_file(file.path()).unwrap();
        assert!(config.delete_missing);
        assert_eq!(config.max_objects, 10);
    }

    #[test]
    fn test_builder() {
        let config = SyncConfig::new()
            .with_halt_on_error(true)
            .with_delete_missing(true)
            .with_max_objects(5);
        assert!(config.halt_on_error);
        assert!(config.delete_missing);
        assert_eq!(config.max_objects, 5);
    }
}

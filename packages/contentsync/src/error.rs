//! Error types for content synchronization.
//!
//! A single `SyncError` covers the whole crate. Each variant belongs to one
//! of the error families (binding, identity, graph, transport) and reports
//! its blast radius through [`SyncError::scope`], so callers can decide
//! whether to skip one content item or abort the run.

use serde::Serialize;
use thiserror::Error;

/// How far an error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorScope {
    /// Aborts the current content item only.
    Item,
    /// Aborts one content type (e.g. a failed read).
    ContentType,
    /// Aborts the whole run.
    Run,
}

/// Main error type for the synchronization core.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A handler could not determine the element or attribute name to use.
    #[error("Cannot resolve qualified name for handler {handler}")]
    UnresolvedName { handler: String },

    /// A bean required by a handler is missing from the bean table.
    #[error("Bean '{bean}' is not bound in the context (required by {handler})")]
    MissingBean { bean: String, handler: String },

    /// A handler was invoked in a direction it does not support.
    #[error("Handler {handler} cannot be used to {direction}")]
    InvalidDirection { handler: String, direction: String },

    /// A value could not be converted to the declared property type.
    #[error("Cannot convert '{value}' to {expected} for property '{property}'")]
    Conversion {
        property: String,
        value: String,
        expected: String,
    },

    /// An attribute was written after the element start tag was closed.
    #[error("Attribute '{attribute}' written after content of <{element}>")]
    AttributeOutOfOrder { attribute: String, element: String },

    /// A binding template references a bean id with no registered factory.
    #[error("No bean factory registered for '{0}'")]
    UnknownBeanFactory(String),

    /// The document root does not match the binding tree root.
    #[error("Expected root element <{expected}>, found <{found}>")]
    RootMismatch { expected: String, found: String },

    /// XML parsing failed.
    #[error("XML parsing failed: {0}")]
    XmlParse(#[from] roxmltree::Error),

    /// Two handles of different content types were combined.
    #[error("Content type mismatch: expected '{expected}', got '{actual}'")]
    HandleTypeMismatch { expected: String, actual: String },

    /// A handle with neither path key nor object id was used where one is required.
    #[error("Handle of type '{0}' has neither path key nor object id")]
    UnsetHandle(String),

    /// A rename would collide with another existing object.
    #[error("Cannot rename {from} to {to}: target already belongs to another object")]
    RenameConflict { from: String, to: String },

    /// An object with the same key or id is already registered.
    #[error("Duplicate handle {0} in content store")]
    DuplicateHandle(String),

    /// No object is registered under the handle.
    #[error("Content object not found: {0}")]
    ObjectNotFound(String),

    /// Invalid path key format.
    #[error("Invalid path key: '{0}'. Expected '/'-separated non-empty segments without '#'")]
    InvalidPathKey(String),

    /// A content tuple was constructed with neither side present.
    #[error("Content tuple must have an old or a new object")]
    EmptyTuple,

    /// The dependency graph contains a cycle among the listed nodes.
    #[error("Dependency cycle detected among: {}", .nodes.join(", "))]
    DependencyCycle { nodes: Vec<String> },

    /// A read or write method failed.
    #[error("Transport error for '{content_type}': {message}")]
    Transport {
        content_type: String,
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML deserialization error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Classify the error by how much of the run it aborts.
    #[must_use]
    pub fn scope(&self) -> ErrorScope {
        match self {
            Self::DependencyCycle { .. } | Self::UnknownBeanFactory(_) | Self::Config(_) => {
                ErrorScope::Run
            }
            Self::Transport { .. } | Self::Io(_) | Self::Yaml(_) => ErrorScope::ContentType,
            _ => ErrorScope::Item,
        }
    }

    /// Whether the error must stop the run regardless of policy.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.scope() == ErrorScope::Run
    }

    /// Create a transport error for a content type.
    pub fn transport(content_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            content_type: content_type.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_names_nodes() {
        let err = SyncError::DependencyCycle {
            nodes: vec!["model:/a".to_string(), "model:/b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Dependency cycle detected among: model:/a, model:/b"
        );
    }

    #[test]
    fn test_scope() {
        assert_eq!(SyncError::EmptyTuple.scope(), ErrorScope::Item);
        assert_eq!(
            SyncError::transport("model", "timeout").scope(),
            ErrorScope::ContentType
        );
        assert!(SyncError::DependencyCycle { nodes: vec![] }.is_fatal());
        assert!(!SyncError::MissingBean {
            bean: "tuple".to_string(),
            handler: "<update>".to_string(),
        }
        .is_fatal());
    }

    #[test]
    fn test_missing_bean_display() {
        let err = SyncError::MissingBean {
            bean: "address".to_string(),
            handler: "<address>".to_string(),
        };
        assert!(err.to_string().contains("'address'"));
        assert!(err.to_string().contains("<address>"));
    }
}

//! XML utility functions for navigating and extracting data from DOM trees.

use std::fmt;

use roxmltree::Node;

/// A namespace-qualified XML name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    namespace: Option<String>,
    local: String,
}

impl QName {
    /// Parse a local name or a Clark-notation name (`{namespace}local`).
    ///
    /// # Examples
    /// ```
    /// use contentsync::xml::QName;
    ///
    /// let name = QName::parse("{urn:reports}report");
    /// assert_eq!(name.namespace(), Some("urn:reports"));
    /// assert_eq!(name.local_name(), "report");
    /// assert_eq!(QName::parse("title").namespace(), None);
    /// ```
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if let Some(rest) = name.strip_prefix('{') {
            if let Some((namespace, local)) = rest.split_once('}') {
                return Self::qualified(namespace, local);
            }
        }
        Self::local(name)
    }

    #[must_use]
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
        }
    }

    #[must_use]
    pub fn qualified(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local: local.into(),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local
    }
}

impl From<&str> for QName {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{{{namespace}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Get the tag name without namespace prefix.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use contentsync::xml::get_tag_name;
///
/// let xml = r#"<r:report xmlns:r="urn:reports"/>"#;
/// let doc = Document::parse(xml).unwrap();
/// assert_eq!(get_tag_name(doc.root_element()), "report");
/// ```
pub fn get_tag_name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

/// Check whether an element carries the given name.
///
/// A name without namespace matches on local name only; a qualified name
/// must also match the element's resolved namespace.
pub fn matches_name(node: Node<'_, '_>, name: &QName) -> bool {
    if !node.is_element() || get_tag_name(node) != name.local_name() {
        return false;
    }
    match name.namespace() {
        Some(namespace) => node.tag_name().namespace().unwrap_or("") == namespace,
        None => true,
    }
}

/// Find the first child element with the given name.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use contentsync::xml::{find_child, QName};
///
/// let xml = r#"<root><child1/><child2/></root>"#;
/// let doc = Document::parse(xml).unwrap();
/// let root = doc.root_element();
///
/// assert!(find_child(root, &QName::local("child1")).is_some());
/// assert!(find_child(root, &QName::local("missing")).is_none());
/// ```
pub fn find_child<'a, 'input>(node: Node<'a, 'input>, name: &QName) -> Option<Node<'a, 'input>> {
    node.children().find(|child| matches_name(*child, name))
}

/// Get all element children of a node (no text nodes, comments, etc.).
pub fn element_children<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|child| child.is_element())
}

/// Get the character content of an element, untrimmed.
///
/// Returns an empty string for an empty element.
pub fn element_text(node: Node<'_, '_>) -> String {
    node.children()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect()
}

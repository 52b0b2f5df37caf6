//! Content objects: a bean plus its identity and structural links.

use serde::{Deserialize, Serialize};

use crate::bean::Bean;
use crate::handle::{ContentHandle, ContentType};

/// A business item being synchronized.
///
/// References to other objects are handle values, never live pointers; the
/// objects themselves live in a [`crate::store::ContentStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentObject {
    handle: ContentHandle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<ContentHandle>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<ContentHandle>,
    bean: Bean,
}

impl ContentObject {
    #[must_use]
    pub fn new(handle: ContentHandle, bean: Bean) -> Self {
        Self {
            handle,
            parent: None,
            children: Vec::new(),
            bean,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: ContentHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: ContentHandle) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn handle(&self) -> &ContentHandle {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut ContentHandle {
        &mut self.handle
    }

    #[must_use]
    pub fn content_type(&self) -> &ContentType {
        self.handle.content_type()
    }

    #[must_use]
    pub fn parent(&self) -> Option<&ContentHandle> {
        self.parent.as_ref()
    }

    #[must_use]
    pub fn children(&self) -> &[ContentHandle] {
        &self.children
    }

    pub fn add_child(&mut self, child: ContentHandle) {
        if !self.children.iter().any(|c| c.matches(&child)) {
            self.children.push(child);
        }
    }

    #[must_use]
    pub fn bean(&self) -> &Bean {
        &self.bean
    }

    pub fn bean_mut(&mut self) -> &mut Bean {
        &mut self.bean
    }

    #[must_use]
    pub fn into_bean(self) -> Bean {
        self.bean
    }

    /// Handles of other objects this object points to through its bean.
    #[must_use]
    pub fn referenced_content(&self) -> Vec<&ContentHandle> {
        self.bean.referenced_handles()
    }

    /// Handles that must exist before this object can be written: the parent
    /// and every referenced object, excluding the object itself.
    #[must_use]
    pub fn dependencies(&self) -> Vec<&ContentHandle> {
        self.parent
            .iter()
            .chain(self.referenced_content())
            .filter(|h| !h.matches(&self.handle))
            .collect()
    }

    /// Rewrite every stored reference equal to `from` (parent, children and
    /// bean handles) to `to`. The object's own handle is left untouched.
    ///
    /// Returns the number of rewritten references.
    pub fn rewrite_reference(&mut self, from: &ContentHandle, to: &ContentHandle) -> usize {
        let mut rewritten = 0;

        if let Some(parent) = self.parent.as_mut().filter(|p| p.matches(from)) {
            *parent = to.clone();
            rewritten += 1;
        }

        for child in self.children.iter_mut().filter(|c| c.matches(from)) {
            *child = to.clone();
            rewritten += 1;
        }

        rewritten + self.bean.rewrite_handles(from, to)
    }

    /// Whether any stored reference equals `handle`.
    #[must_use]
    pub fn references(&self, handle: &ContentHandle) -> bool {
        self.parent.iter().any(|p| p.matches(handle))
            || self.children.iter().any(|c| c.matches(handle))
            || self.referenced_content().iter().any(|h| h.matches(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ContentObject {
        let folder = ContentHandle::with_key("folder", "/shared");
        let bean = Bean::new("report")
            .with("title", "Sales")
            .with("model", ContentHandle::with_key("model", "/models/sales"));
        ContentObject::new(ContentHandle::with_key("report", "/shared/sales"), bean)
            .with_parent(folder)
    }

    #[test]
    fn test_dependencies_include_parent_and_references() {
        let object = report();
        let deps = object.dependencies();
        assert_eq!(deps.len(), 2);
        assert!(deps[0].matches(&ContentHandle::with_key("folder", "/shared")));
        assert!(deps[1].matches(&ContentHandle::with_key("model", "/models/sales")));
    }

    #[test]
    fn test_self_reference_is_not_a_dependency() {
        let handle = ContentHandle::with_key("report", "/r");
        let bean = Bean::new("report").with("drill", handle.clone());
        let object = ContentObject::new(handle, bean);
        assert!(object.dependencies().is_empty());
    }

    #[test]
    fn test_rewrite_reference() {
        let mut object = report();
        let from = ContentHandle::with_key("model", "/models/sales");
        let to = ContentHandle::with_key("model", "/models/revenue");

        assert_eq!(object.rewrite_reference(&from, &to), 1);
        assert!(!object.references(&from));
        assert!(object.references(&to));
    }

    #[test]
    fn test_add_child_deduplicates() {
        let mut folder = ContentObject::new(
            ContentHandle::with_key("folder", "/shared"),
            Bean::new("folder"),
        );
        folder.add_child(ContentHandle::with_key("report", "/shared/a"));
        folder.add_child(ContentHandle::with_key("report", "/shared/a").id("3"));
        assert_eq!(folder.children().len(), 1);
    }
}

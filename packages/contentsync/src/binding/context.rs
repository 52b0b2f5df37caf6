//! State carried through one marshal or unmarshal pass.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use roxmltree::Node;

use crate::bean::Bean;
use crate::error::{Result, SyncError};
use crate::tuple::{ContentTuple, Operation};
use crate::xml::XmlWriter;

/// Direction of a binding pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Bean to XML.
    Marshal,
    /// XML to bean.
    Unmarshal,
}

impl Direction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Marshal => "marshal",
            Self::Unmarshal => "unmarshal",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replaces the handler-driven binding of one bean's element content.
pub trait CustomMarshaller: Send + Sync {
    /// Write the content of the bean's element (the start tag is already open).
    fn marshal(&self, bean: &Bean, writer: &mut XmlWriter) -> Result<()>;

    /// Fill the bean from its element.
    fn unmarshal(&self, source: Node<'_, '_>, bean: &mut Bean) -> Result<()>;
}

/// Something bound in the bean table.
#[derive(Debug, Clone)]
pub enum Bound {
    Bean(Bean),
    Tuple(ContentTuple),
}

/// Binding context for one pass.
///
/// Holds the bean table, the active-bean stack, the namespace stack and,
/// when marshalling, the XML writer. The XML cursor for unmarshalling is
/// passed to handlers separately.
pub struct BindingContext {
    direction: Direction,
    operation: Option<Operation>,
    writer: XmlWriter,
    beans: HashMap<String, Bound>,
    marshallers: HashMap<String, Arc<dyn CustomMarshaller>>,
    active: Vec<String>,
    namespaces: Vec<String>,
}

impl BindingContext {
    #[must_use]
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            operation: None,
            writer: XmlWriter::new(),
            beans: HashMap::new(),
            marshallers: HashMap::new(),
            active: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    #[must_use]
    pub fn for_marshal() -> Self {
        Self::new(Direction::Marshal)
    }

    #[must_use]
    pub fn for_unmarshal() -> Self {
        Self::new(Direction::Unmarshal)
    }

    /// Set the operation mode consulted by `skip-on-*` parameters.
    #[must_use]
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn set_operation(&mut self, operation: Option<Operation>) {
        self.operation = operation;
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    // --- bean table ---

    /// Bind a bean under a name, replacing whatever was bound there.
    pub fn bind_bean(&mut self, name: impl Into<String>, bean: Bean) {
        self.beans.insert(name.into(), Bound::Bean(bean));
    }

    pub fn bind_tuple(&mut self, name: impl Into<String>, tuple: ContentTuple) {
        self.beans.insert(name.into(), Bound::Tuple(tuple));
    }

    /// Register a custom marshaller for the bean bound under `name`.
    ///
    /// The registration outlives rebinding of the bean itself.
    pub fn register_marshaller(
        &mut self,
        name: impl Into<String>,
        marshaller: Arc<dyn CustomMarshaller>,
    ) {
        self.marshallers.insert(name.into(), marshaller);
    }

    #[must_use]
    pub fn marshaller(&self, name: &str) -> Option<Arc<dyn CustomMarshaller>> {
        self.marshallers.get(name).cloned()
    }

    #[must_use]
    pub fn is_bound(&self, name: &str) -> bool {
        self.beans.contains_key(name)
    }

    #[must_use]
    pub fn bean(&self, name: &str) -> Option<&Bean> {
        match self.beans.get(name) {
            Some(Bound::Bean(bean)) => Some(bean),
            _ => None,
        }
    }

    pub fn bean_mut(&mut self, name: &str) -> Option<&mut Bean> {
        match self.beans.get_mut(name) {
            Some(Bound::Bean(bean)) => Some(bean),
            _ => None,
        }
    }

    #[must_use]
    pub fn tuple(&self, name: &str) -> Option<&ContentTuple> {
        match self.beans.get(name) {
            Some(Bound::Tuple(tuple)) => Some(tuple),
            _ => None,
        }
    }

    /// Remove a bound bean and return it. Tuples stay bound.
    pub fn take_bean(&mut self, name: &str) -> Option<Bean> {
        if !matches!(self.beans.get(name), Some(Bound::Bean(_))) {
            return None;
        }
        match self.beans.remove(name) {
            Some(Bound::Bean(bean)) => Some(bean),
            _ => None,
        }
    }

    pub fn unbind(&mut self, name: &str) -> Option<Bound> {
        self.beans.remove(name)
    }

    /// The bean bound under `name` together with the writer.
    pub(crate) fn bean_and_writer(&mut self, name: &str) -> Option<(&Bean, &mut XmlWriter)> {
        match self.beans.get(name) {
            Some(Bound::Bean(bean)) => Some((bean, &mut self.writer)),
            _ => None,
        }
    }

    // --- active bean ---

    pub fn push_active(&mut self, name: impl Into<String>) {
        self.active.push(name.into());
    }

    pub fn pop_active(&mut self) -> Option<String> {
        self.active.pop()
    }

    #[must_use]
    pub fn active_name(&self) -> Option<&str> {
        self.active.last().map(String::as_str)
    }

    #[must_use]
    pub fn active_bean(&self) -> Option<&Bean> {
        self.active_name().and_then(|name| self.bean(name))
    }

    pub fn active_bean_mut(&mut self) -> Option<&mut Bean> {
        let name = self.active.last()?.clone();
        self.bean_mut(&name)
    }

    /// The active bean, or `MissingBean` naming the requesting handler.
    ///
    /// # Errors
    /// Returns `MissingBean` when no bean is active.
    pub fn require_active_bean(&self, handler: &str) -> Result<&Bean> {
        self.active_bean().ok_or_else(|| self.missing_active(handler))
    }

    /// Mutable variant of [`Self::require_active_bean`].
    ///
    /// # Errors
    /// Returns `MissingBean` when no bean is active.
    pub fn require_active_bean_mut(&mut self, handler: &str) -> Result<&mut Bean> {
        let err = self.missing_active(handler);
        self.active_bean_mut().ok_or(err)
    }

    fn missing_active(&self, handler: &str) -> SyncError {
        SyncError::MissingBean {
            bean: self.active_name().unwrap_or("<none>").to_string(),
            handler: handler.to_string(),
        }
    }

    // --- namespaces ---

    /// Namespace in effect for the element being written; empty at the top.
    #[must_use]
    pub fn current_namespace(&self) -> &str {
        self.namespaces.last().map_or("", String::as_str)
    }

    pub fn push_namespace(&mut self, namespace: impl Into<String>) {
        self.namespaces.push(namespace.into());
    }

    pub fn pop_namespace(&mut self) -> Option<String> {
        self.namespaces.pop()
    }

    // --- output ---

    pub fn writer_mut(&mut self) -> &mut XmlWriter {
        &mut self.writer
    }

    /// Close any open elements and return the produced XML.
    #[must_use]
    pub fn into_output(self) -> String {
        self.writer.finish()
    }
}

impl fmt::Debug for BindingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bound: Vec<&str> = self.beans.keys().map(String::as_str).collect();
        bound.sort_unstable();
        f.debug_struct("BindingContext")
            .field("direction", &self.direction)
            .field("operation", &self.operation)
            .field("bound", &bound)
            .field("active", &self.active)
            .field("namespaces", &self.namespaces)
            .finish_non_exhaustive()
    }
}

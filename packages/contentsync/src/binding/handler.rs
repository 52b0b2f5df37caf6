//! Binding handler trait definition.

use std::fmt;

use roxmltree::Node;

use super::context::BindingContext;
use super::node::HandlerNode;
use super::params::ValueState;
use crate::bean::BeanRegistry;
use crate::error::Result;
use crate::xml::QName;

/// Classification of binding handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Writes or reads an element and recurses into its children.
    Element,
    /// Binds an attribute of the enclosing element.
    Attribute,
    /// Binds the text of a child element, or assigns a nested bean.
    Property,
    /// Binds the text content of the enclosing element.
    Value,
    /// Marshals a content tuple.
    Tuple,
}

impl HandlerKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Element => "element",
            Self::Attribute => "attribute",
            Self::Property => "property",
            Self::Value => "value",
            Self::Tuple => "tuple",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for binding handlers.
///
/// A handler is attached to one [`HandlerNode`] and receives that node on
/// every call, so it can reach the node's name, parameters and children.
/// Child processing goes through [`HandlerNode::marshal`] and
/// [`HandlerNode::unmarshal`], which apply `should_execute` first.
pub trait BindingHandler: Send + Sync + fmt::Debug {
    /// Return the kind of this handler.
    fn kind(&self) -> HandlerKind;

    /// Bean property this handler binds, if any.
    fn property(&self) -> Option<&str> {
        None
    }

    /// Bean id this handler activates, if any.
    fn bean_id(&self) -> Option<&str> {
        None
    }

    /// `(bean id, property)` when this handler assigns a nested bean.
    fn sub_bean(&self) -> Option<(&str, &str)> {
        None
    }

    /// Validate the handler and resolve bean factories when the tree is built.
    fn prepare(&mut self, _name: Option<&QName>, _registry: &BeanRegistry) -> Result<()> {
        Ok(())
    }

    /// Probe the value this handler would write.
    fn marshal_state(&self, _node: &HandlerNode, _context: &BindingContext) -> Result<ValueState> {
        Ok(ValueState::Unbound)
    }

    /// Probe the value this handler would read from `source`.
    fn unmarshal_state(
        &self,
        _node: &HandlerNode,
        _source: Node<'_, '_>,
        _context: &BindingContext,
    ) -> Result<ValueState> {
        Ok(ValueState::Unbound)
    }

    /// Write the node's XML to the context writer.
    fn marshal(&self, node: &HandlerNode, context: &mut BindingContext) -> Result<()>;

    /// Read the node's data from `source`, the element enclosing this node.
    fn unmarshal(
        &self,
        node: &HandlerNode,
        source: Node<'_, '_>,
        context: &mut BindingContext,
    ) -> Result<()>;
}

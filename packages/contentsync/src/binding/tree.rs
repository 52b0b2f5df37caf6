//! Built binding trees and the marshal/unmarshal entry points.

use roxmltree::{Document, Node};

use super::context::BindingContext;
use super::node::HandlerNode;
use crate::bean::{Bean, BeanRegistry};
use crate::config::{ROOT_BEAN, TUPLE_BEAN};
use crate::error::{Result, SyncError};
use crate::tuple::{ContentTuple, Operation};
use crate::xml::{matches_name, QName};

/// A validated handler tree.
///
/// Building resolves every bean id against a [`BeanRegistry`] and checks
/// that named handlers have names, so a template error surfaces once at
/// load time instead of on every document.
#[derive(Debug)]
pub struct BindingTree {
    root: HandlerNode,
}

impl BindingTree {
    /// Validate a template and resolve its bean factories.
    ///
    /// # Errors
    /// Returns `UnknownBeanFactory` for an unregistered bean id and
    /// `UnresolvedName` for a property or attribute without a name.
    pub fn build(mut root: HandlerNode, registry: &BeanRegistry) -> Result<Self> {
        root.prepare(registry)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &HandlerNode {
        &self.root
    }

    /// Marshal a bean to an XML document.
    pub fn marshal(&self, bean: &Bean, operation: Option<Operation>) -> Result<String> {
        let mut context = BindingContext::for_marshal();
        context.set_operation(operation);
        context.bind_bean(ROOT_BEAN, bean.clone());
        self.marshal_in(&mut context)?;
        Ok(context.into_output())
    }

    /// Marshal a content tuple; the operation mode follows the tuple.
    ///
    /// The write object's bean is also bound as the root bean, so templates
    /// without a tuple node still produce the write object.
    pub fn marshal_tuple(&self, tuple: &ContentTuple) -> Result<String> {
        let mut context = BindingContext::for_marshal().with_operation(tuple.operation());
        context.bind_tuple(TUPLE_BEAN, tuple.clone());
        context.bind_bean(ROOT_BEAN, tuple.write_object().bean().clone());
        self.marshal_in(&mut context)?;
        Ok(context.into_output())
    }

    /// Marshal into a prepared context (custom marshallers, extra beans).
    ///
    /// The root bean is made active when nothing else is.
    pub fn marshal_in(&self, context: &mut BindingContext) -> Result<()> {
        if context.active_name().is_none() && context.is_bound(ROOT_BEAN) {
            context.push_active(ROOT_BEAN);
        }
        tracing::debug!(root = %self.root.describe(), "marshalling");
        self.root.marshal(context)
    }

    /// Unmarshal an XML document into a fresh bean.
    pub fn unmarshal(&self, xml: &str, operation: Option<Operation>) -> Result<Bean> {
        let mut context = BindingContext::for_unmarshal();
        context.set_operation(operation);
        self.unmarshal_in(xml, &mut context)?;

        let bean_name = self.root.handler().bean_id().unwrap_or(ROOT_BEAN);
        context
            .take_bean(bean_name)
            .ok_or_else(|| SyncError::MissingBean {
                bean: bean_name.to_string(),
                handler: self.root.describe(),
            })
    }

    /// Unmarshal into a prepared context.
    ///
    /// A bean already bound as root is merged into: properties that already
    /// hold a value are kept unless their node sets `replace`.
    ///
    /// # Errors
    /// Returns `XmlParse` for malformed XML and `RootMismatch` when the
    /// document root does not carry the template root's name.
    pub fn unmarshal_in(&self, xml: &str, context: &mut BindingContext) -> Result<()> {
        let document = Document::parse(xml)?;
        let root_element = document.root_element();

        if let Some(expected) = self.root.name() {
            if !matches_name(root_element, expected) {
                return Err(SyncError::RootMismatch {
                    expected: expected.to_string(),
                    found: element_name(root_element).to_string(),
                });
            }
        }

        if !context.is_bound(ROOT_BEAN) {
            context.bind_bean(ROOT_BEAN, self.root_bean(root_element));
        }
        if context.active_name().is_none() {
            context.push_active(ROOT_BEAN);
        }

        tracing::debug!(root = %self.root.describe(), "unmarshalling");
        self.root.unmarshal(document.root(), context)
    }

    /// Empty bean for the document, named after the template root or, for
    /// a natural-name root, after the document element.
    fn root_bean(&self, root_element: Node<'_, '_>) -> Bean {
        match self.root.name() {
            Some(name) => Bean::new(name.local_name()),
            None => {
                let bean = Bean::new(root_element.tag_name().name());
                match root_element.tag_name().namespace() {
                    Some(namespace) => bean.with_namespace(namespace),
                    None => bean,
                }
            }
        }
    }
}

fn element_name(node: Node<'_, '_>) -> QName {
    match node.tag_name().namespace() {
        Some(namespace) => QName::qualified(namespace, node.tag_name().name()),
        None => QName::local(node.tag_name().name()),
    }
}

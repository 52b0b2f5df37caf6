//! Element handler: writes or reads one element and recurses into it.

use std::fmt;

use roxmltree::Node;

use crate::bean::{BeanFactory, BeanRegistry};
use crate::binding::context::{BindingContext, Direction};
use crate::binding::handler::{BindingHandler, HandlerKind};
use crate::binding::node::{natural_name, HandlerNode};
use crate::binding::params::ValueState;
use crate::error::{Result, SyncError};
use crate::xml::{find_child, QName};

/// Handler for `<element>` template nodes.
///
/// With a bean id the element activates that bean for its subtree: on
/// marshal the bean is taken from the bean table, on unmarshal a fresh
/// instance is created from the registered factory and bound under the id.
/// A custom marshaller registered for the bean id replaces the recursion.
#[derive(Default)]
pub struct ElementHandler {
    bean_id: Option<String>,
    factory: Option<BeanFactory>,
    text: Option<String>,
}

impl ElementHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_bean(bean_id: impl Into<String>) -> Self {
        Self {
            bean_id: Some(bean_id.into()),
            ..Self::default()
        }
    }

    /// Literal text written after the element's children.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    fn target_name(&self, node: &HandlerNode, context: &BindingContext) -> Result<QName> {
        if let Some(name) = node.name() {
            return Ok(name.clone());
        }
        let Some(bean_id) = &self.bean_id else {
            return node.resolve_name(context);
        };
        let natural = match context.direction() {
            Direction::Marshal => context.bean(bean_id).and_then(natural_name),
            Direction::Unmarshal => self.factory.as_ref().and_then(|factory| natural_name(&factory())),
        };
        natural.ok_or_else(|| SyncError::UnresolvedName {
            handler: node.describe(),
        })
    }

    fn write(&self, node: &HandlerNode, name: &QName, context: &mut BindingContext) -> Result<()> {
        let pushed = node.open_element(name, context)?;

        let custom = self
            .bean_id
            .as_deref()
            .and_then(|id| context.marshaller(id).map(|marshaller| (id, marshaller)));
        match custom {
            Some((bean_id, marshaller)) => {
                if let Some((bean, writer)) = context.bean_and_writer(bean_id) {
                    marshaller.marshal(bean, writer)?;
                }
            }
            None => {
                node.marshal_children(context)?;
                if let Some(text) = &self.text {
                    context.writer_mut().text(text);
                }
            }
        }

        node.close_element(pushed, context);
        Ok(())
    }

    fn read(
        &self,
        node: &HandlerNode,
        bean_id: &str,
        element: Node<'_, '_>,
        context: &mut BindingContext,
    ) -> Result<()> {
        match context.marshaller(bean_id) {
            Some(marshaller) => match context.bean_mut(bean_id) {
                Some(bean) => marshaller.unmarshal(element, bean),
                None => Ok(()),
            },
            None => node.unmarshal_children(element, context),
        }
    }
}

impl BindingHandler for ElementHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Element
    }

    fn bean_id(&self) -> Option<&str> {
        self.bean_id.as_deref()
    }

    fn prepare(&mut self, _name: Option<&QName>, registry: &BeanRegistry) -> Result<()> {
        if let Some(bean_id) = &self.bean_id {
            self.factory = Some(registry.factory(bean_id)?);
        }
        Ok(())
    }

    fn marshal_state(&self, _node: &HandlerNode, context: &BindingContext) -> Result<ValueState> {
        Ok(match &self.bean_id {
            Some(bean_id) if context.bean(bean_id).is_none() => ValueState::Null,
            _ => ValueState::Unbound,
        })
    }

    fn unmarshal_state(
        &self,
        node: &HandlerNode,
        source: Node<'_, '_>,
        context: &BindingContext,
    ) -> Result<ValueState> {
        let name = self.target_name(node, context)?;
        Ok(match find_child(source, &name) {
            Some(_) => ValueState::Unbound,
            None => ValueState::Null,
        })
    }

    fn marshal(&self, node: &HandlerNode, context: &mut BindingContext) -> Result<()> {
        let name = self.target_name(node, context)?;
        let Some(bean_id) = &self.bean_id else {
            return self.write(node, &name, context);
        };

        if context.bean(bean_id).is_none() {
            return Err(SyncError::MissingBean {
                bean: bean_id.clone(),
                handler: node.describe(),
            });
        }
        context.push_active(bean_id.as_str());
        let result = self.write(node, &name, context);
        context.pop_active();
        result
    }

    fn unmarshal(
        &self,
        node: &HandlerNode,
        source: Node<'_, '_>,
        context: &mut BindingContext,
    ) -> Result<()> {
        let name = self.target_name(node, context)?;
        let Some(element) = find_child(source, &name) else {
            return Ok(());
        };

        let Some(bean_id) = &self.bean_id else {
            return node.unmarshal_children(element, context);
        };
        let factory = self
            .factory
            .as_ref()
            .ok_or_else(|| SyncError::UnknownBeanFactory(bean_id.clone()))?;

        context.bind_bean(bean_id.as_str(), factory());
        context.push_active(bean_id.as_str());
        let result = self.read(node, bean_id, element, context);
        context.pop_active();
        result
    }
}

impl fmt::Debug for ElementHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementHandler")
            .field("bean_id", &self.bean_id)
            .field("factory", &self.factory.is_some())
            .field("text", &self.text)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::{Bean, ValueType};
    use crate::binding::params::HandlerParams;

    fn marshal_with_root(node: &HandlerNode, bean: Bean) -> Result<String> {
        let mut context = BindingContext::for_marshal();
        context.bind_bean("root", bean);
        context.push_active("root");
        node.marshal(&mut context)?;
        Ok(context.into_output())
    }

    #[test]
    fn test_literal_text_and_attributes_first() {
        let node = HandlerNode::new(ElementHandler::new().with_text("fixed"))
            .named("note")
            .with_child(HandlerNode::property("title", "title", ValueType::Text))
            .with_child(HandlerNode::attribute("lang", "lang", ValueType::Text));

        let xml = marshal_with_root(
            &node,
            Bean::new("note").with("title", "Hi").with("lang", "en"),
        )
        .unwrap();
        assert_eq!(xml, r#"<note lang="en"><title>Hi</title>fixed</note>"#);
    }

    #[test]
    fn test_missing_bean_fails() {
        let node = HandlerNode::bean_element("address", "address");
        let err = marshal_with_root(&node, Bean::new("person")).unwrap_err();
        assert!(matches!(err, SyncError::MissingBean { ref bean, .. } if bean == "address"));
    }

    #[test]
    fn test_missing_bean_skipped_if_null() {
        let node = HandlerNode::element("person").with_child(
            HandlerNode::bean_element("address", "address")
                .with_params(HandlerParams::new().skip_if_null()),
        );
        let xml = marshal_with_root(&node, Bean::new("person")).unwrap();
        assert_eq!(xml, "<person/>");
    }

    #[test]
    fn test_namespace_declared_on_change_only() {
        let node = HandlerNode::element("{urn:r}report")
            .with_child(HandlerNode::element("{urn:r}body"))
            .with_child(HandlerNode::element("{urn:x}extra"))
            .with_child(HandlerNode::element("plain"));

        let xml = marshal_with_root(&node, Bean::new("report")).unwrap();
        assert_eq!(
            xml,
            r#"<report xmlns="urn:r"><body/><extra xmlns="urn:x"/><plain/></report>"#
        );
    }

    #[test]
    fn test_preserve_namespace_declares_empty_namespace() {
        let node = HandlerNode::element("report").with_child(
            HandlerNode::element("body").with_params(HandlerParams::new().preserve_namespace()),
        );
        let xml = marshal_with_root(&node, Bean::new("report")).unwrap();
        assert_eq!(xml, r#"<report><body xmlns=""/></report>"#);
    }

    #[test]
    fn test_natural_name_from_active_bean() {
        let node = HandlerNode::natural_element();
        let xml = marshal_with_root(&node, Bean::new("invoice")).unwrap();
        assert_eq!(xml, "<invoice/>");
    }
}

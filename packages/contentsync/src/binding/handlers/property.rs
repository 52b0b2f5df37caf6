//! Value-bearing handlers: property elements, attributes and text values.

use roxmltree::Node;

use crate::bean::{BeanRegistry, Value, ValueType};
use crate::binding::context::BindingContext;
use crate::binding::handler::{BindingHandler, HandlerKind};
use crate::binding::node::HandlerNode;
use crate::binding::params::ValueState;
use crate::error::{Result, SyncError};
use crate::xml::{element_text, find_child, QName};

/// Binding of one bean property to XML text, with an optional literal default.
#[derive(Debug, Clone)]
struct ValueBinding {
    property: Option<String>,
    value_type: ValueType,
    default: Option<String>,
}

impl ValueBinding {
    fn bound(property: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            property: Some(property.into()),
            value_type,
            default: None,
        }
    }

    fn literal(text: impl Into<String>) -> Self {
        Self {
            property: None,
            value_type: ValueType::Text,
            default: Some(text.into()),
        }
    }

    /// Text to write: the property value, falling back to the default.
    fn text(&self, node: &HandlerNode, context: &BindingContext) -> Result<Option<String>> {
        let from_bean = match &self.property {
            Some(property) => context
                .require_active_bean(&node.describe())?
                .get(property)
                .and_then(Value::to_xml_text),
            None => None,
        };
        Ok(from_bean.or_else(|| self.default.clone()))
    }

    fn state(&self, node: &HandlerNode, context: &BindingContext) -> Result<ValueState> {
        Ok(ValueState::of_text(self.text(node, context)?.as_deref()))
    }

    /// Convert `text` and store it on the active bean. Literals store nothing.
    fn store(&self, node: &HandlerNode, text: &str, context: &mut BindingContext) -> Result<()> {
        let Some(property) = &self.property else {
            return Ok(());
        };
        if let Some(value) = self.value_type.parse(property, text)? {
            context
                .require_active_bean_mut(&node.describe())?
                .set(property.as_str(), value);
        }
        Ok(())
    }
}

fn require_name(name: Option<&QName>, kind: HandlerKind, property: Option<&str>) -> Result<()> {
    if name.is_some() {
        return Ok(());
    }
    Err(SyncError::UnresolvedName {
        handler: match property {
            Some(property) => format!("{kind} '{property}'"),
            None => kind.to_string(),
        },
    })
}

fn explicit_name<'a>(node: &'a HandlerNode) -> Result<&'a QName> {
    node.name().ok_or_else(|| SyncError::UnresolvedName {
        handler: node.describe(),
    })
}

/// Handler for `<property>` template nodes.
///
/// Binds the text of a named child element to a bean property, or, with a
/// bean id, assigns the nested bean bound under that id to the property.
#[derive(Debug, Clone)]
pub struct PropertyHandler {
    value: ValueBinding,
    nested_bean: Option<String>,
}

impl PropertyHandler {
    #[must_use]
    pub fn new(property: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            value: ValueBinding::bound(property, value_type),
            nested_bean: None,
        }
    }

    /// Property holding the nested bean bound under `bean_id`.
    #[must_use]
    pub fn nested(property: impl Into<String>, bean_id: impl Into<String>) -> Self {
        Self {
            value: ValueBinding::bound(property, ValueType::Text),
            nested_bean: Some(bean_id.into()),
        }
    }

    /// Text used when the property has no value, and when the element is
    /// absent on unmarshal.
    #[must_use]
    pub fn with_default(mut self, text: impl Into<String>) -> Self {
        self.value.default = Some(text.into());
        self
    }
}

impl BindingHandler for PropertyHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Property
    }

    fn property(&self) -> Option<&str> {
        self.value.property.as_deref()
    }

    fn sub_bean(&self) -> Option<(&str, &str)> {
        let bean_id = self.nested_bean.as_deref()?;
        Some((bean_id, self.value.property.as_deref()?))
    }

    fn prepare(&mut self, name: Option<&QName>, registry: &BeanRegistry) -> Result<()> {
        match &self.nested_bean {
            Some(bean_id) if !registry.contains(bean_id) => {
                Err(SyncError::UnknownBeanFactory(bean_id.clone()))
            }
            Some(_) => Ok(()),
            None => require_name(name, self.kind(), self.property()),
        }
    }

    fn marshal_state(&self, node: &HandlerNode, context: &BindingContext) -> Result<ValueState> {
        if self.nested_bean.is_some() {
            return Ok(ValueState::Unbound);
        }
        self.value.state(node, context)
    }

    fn unmarshal_state(
        &self,
        node: &HandlerNode,
        source: Node<'_, '_>,
        context: &BindingContext,
    ) -> Result<ValueState> {
        if let Some(bean_id) = &self.nested_bean {
            return Ok(if context.bean(bean_id).is_some() {
                ValueState::Present
            } else {
                ValueState::Null
            });
        }
        let name = explicit_name(node)?;
        let text = find_child(source, name).map(element_text);
        Ok(ValueState::of_text(text.as_deref()))
    }

    fn marshal(&self, node: &HandlerNode, context: &mut BindingContext) -> Result<()> {
        // Nested beans are published to the bean table by the parent element.
        if self.nested_bean.is_some() {
            return Ok(());
        }
        let name = explicit_name(node)?;
        // An absent value writes no element, so it unmarshals back as absent.
        let Some(text) = self.value.text(node, context)? else {
            return Ok(());
        };

        let pushed = node.open_element(name, context)?;
        context.writer_mut().text(&text);
        node.close_element(pushed, context);
        Ok(())
    }

    fn unmarshal(
        &self,
        node: &HandlerNode,
        source: Node<'_, '_>,
        context: &mut BindingContext,
    ) -> Result<()> {
        if let Some(bean_id) = &self.nested_bean {
            let nested = context
                .bean(bean_id)
                .cloned()
                .ok_or_else(|| SyncError::MissingBean {
                    bean: bean_id.clone(),
                    handler: node.describe(),
                })?;
            let property = self.property().unwrap_or_default().to_string();
            context
                .require_active_bean_mut(&node.describe())?
                .set(property, Value::from(nested));
            return Ok(());
        }

        let name = explicit_name(node)?;
        match find_child(source, name) {
            Some(element) => self.value.store(node, &element_text(element), context),
            None => match &self.value.default {
                Some(default) => self.value.store(node, default, context),
                None => Ok(()),
            },
        }
    }
}

/// Handler for `<attribute>` template nodes.
///
/// Attributes are matched and written by local name.
#[derive(Debug, Clone)]
pub struct AttributeHandler {
    value: ValueBinding,
}

impl AttributeHandler {
    #[must_use]
    pub fn new(property: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            value: ValueBinding::bound(property, value_type),
        }
    }

    /// Attribute with fixed text, not bound to any property.
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            value: ValueBinding::literal(text),
        }
    }

    #[must_use]
    pub fn with_default(mut self, text: impl Into<String>) -> Self {
        self.value.default = Some(text.into());
        self
    }
}

impl BindingHandler for AttributeHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Attribute
    }

    fn property(&self) -> Option<&str> {
        self.value.property.as_deref()
    }

    fn prepare(&mut self, name: Option<&QName>, _registry: &BeanRegistry) -> Result<()> {
        require_name(name, self.kind(), self.property())
    }

    fn marshal_state(&self, node: &HandlerNode, context: &BindingContext) -> Result<ValueState> {
        self.value.state(node, context)
    }

    fn unmarshal_state(
        &self,
        node: &HandlerNode,
        source: Node<'_, '_>,
        _context: &BindingContext,
    ) -> Result<ValueState> {
        let name = explicit_name(node)?;
        Ok(ValueState::of_text(source.attribute(name.local_name())))
    }

    fn marshal(&self, node: &HandlerNode, context: &mut BindingContext) -> Result<()> {
        let name = explicit_name(node)?;
        match self.value.text(node, context)? {
            Some(text) => context.writer_mut().attribute(name.local_name(), &text),
            None => Ok(()),
        }
    }

    fn unmarshal(
        &self,
        node: &HandlerNode,
        source: Node<'_, '_>,
        context: &mut BindingContext,
    ) -> Result<()> {
        let name = explicit_name(node)?;
        match source.attribute(name.local_name()) {
            Some(text) => self.value.store(node, text, context),
            None => Ok(()),
        }
    }
}

/// Handler for `<value>` template nodes: the enclosing element's text.
#[derive(Debug, Clone)]
pub struct ValueHandler {
    value: ValueBinding,
}

impl ValueHandler {
    #[must_use]
    pub fn new(property: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            value: ValueBinding::bound(property, value_type),
        }
    }

    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            value: ValueBinding::literal(text),
        }
    }
}

impl BindingHandler for ValueHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Value
    }

    fn property(&self) -> Option<&str> {
        self.value.property.as_deref()
    }

    fn marshal_state(&self, node: &HandlerNode, context: &BindingContext) -> Result<ValueState> {
        self.value.state(node, context)
    }

    fn unmarshal_state(
        &self,
        _node: &HandlerNode,
        source: Node<'_, '_>,
        _context: &BindingContext,
    ) -> Result<ValueState> {
        let text = element_text(source);
        Ok(ValueState::of_text(Some(text.as_str())))
    }

    fn marshal(&self, node: &HandlerNode, context: &mut BindingContext) -> Result<()> {
        if let Some(text) = self.value.text(node, context)? {
            context.writer_mut().text(&text);
        }
        Ok(())
    }

    fn unmarshal(
        &self,
        node: &HandlerNode,
        source: Node<'_, '_>,
        context: &mut BindingContext,
    ) -> Result<()> {
        self.value.store(node, &element_text(source), context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::Bean;
    use crate::binding::params::HandlerParams;
    use roxmltree::Document;

    fn marshal_context(bean: Bean) -> BindingContext {
        let mut context = BindingContext::for_marshal();
        context.bind_bean("root", bean);
        context.push_active("root");
        context
    }

    fn unmarshal_context(bean: Bean) -> BindingContext {
        let mut context = BindingContext::for_unmarshal();
        context.bind_bean("root", bean);
        context.push_active("root");
        context
    }

    #[test]
    fn test_property_marshal_absent_writes_nothing() {
        let node = HandlerNode::property("title", "title", ValueType::Text);
        let mut context = marshal_context(Bean::new("report"));
        node.marshal(&mut context).unwrap();
        assert_eq!(context.into_output(), "");
    }

    #[test]
    fn test_property_marshal_empty_text_writes_empty_element() {
        let node = HandlerNode::property("title", "title", ValueType::Text);
        let mut context = marshal_context(Bean::new("report").with("title", ""));
        node.marshal(&mut context).unwrap();
        assert_eq!(context.into_output(), "<title/>");
    }

    #[test]
    fn test_property_marshal_absent_skipped_if_null() {
        let node = HandlerNode::property("title", "title", ValueType::Text)
            .with_params(HandlerParams::new().skip_if_null());
        let mut context = marshal_context(Bean::new("report"));
        node.marshal(&mut context).unwrap();
        assert_eq!(context.into_output(), "");
    }

    #[test]
    fn test_property_unmarshal_typed() {
        let doc = Document::parse("<r><count>42</count><ok>1</ok></r>").unwrap();
        let mut context = unmarshal_context(Bean::new("r"));

        HandlerNode::property("count", "count", ValueType::Integer)
            .unmarshal(doc.root_element(), &mut context)
            .unwrap();
        HandlerNode::property("ok", "ok", ValueType::Boolean)
            .unmarshal(doc.root_element(), &mut context)
            .unwrap();

        let bean = context.active_bean().unwrap();
        assert_eq!(bean.get("count"), Some(&Value::Integer(42)));
        assert_eq!(bean.get("ok"), Some(&Value::Boolean(true)));
    }

    #[test]
    fn test_property_unmarshal_conversion_error() {
        let doc = Document::parse("<r><count>many</count></r>").unwrap();
        let mut context = unmarshal_context(Bean::new("r"));
        let err = HandlerNode::property("count", "count", ValueType::Integer)
            .unmarshal(doc.root_element(), &mut context)
            .unwrap_err();
        assert!(matches!(err, SyncError::Conversion { .. }));
    }

    #[test]
    fn test_property_unmarshal_empty_text() {
        let doc = Document::parse("<r><title/><count/></r>").unwrap();
        let mut context = unmarshal_context(Bean::new("r"));
        HandlerNode::property("title", "title", ValueType::Text)
            .unmarshal(doc.root_element(), &mut context)
            .unwrap();
        HandlerNode::property("count", "count", ValueType::Integer)
            .unmarshal(doc.root_element(), &mut context)
            .unwrap();

        let bean = context.active_bean().unwrap();
        assert_eq!(bean.get("title"), Some(&Value::Text(String::new())));
        assert_eq!(bean.get("count"), None);
    }

    #[test]
    fn test_property_default_when_element_missing() {
        let doc = Document::parse("<r/>").unwrap();
        let mut context = unmarshal_context(Bean::new("r"));
        HandlerNode::new(PropertyHandler::new("status", ValueType::Text).with_default("draft"))
            .named("status")
            .unmarshal(doc.root_element(), &mut context)
            .unwrap();
        assert_eq!(
            context.active_bean().unwrap().get("status"),
            Some(&Value::from("draft"))
        );
    }

    #[test]
    fn test_attribute_marshal_absent_writes_nothing() {
        let node = HandlerNode::attribute("id", "number", ValueType::Integer);
        let mut context = marshal_context(Bean::new("r"));
        context.writer_mut().start_element("r");
        node.marshal(&mut context).unwrap();
        assert_eq!(context.into_output(), "<r/>");
    }

    #[test]
    fn test_attribute_round_trip() {
        let node = HandlerNode::attribute("id", "number", ValueType::Integer);
        let mut context = marshal_context(Bean::new("r").with("number", 7_i64));
        context.writer_mut().start_element("r");
        node.marshal(&mut context).unwrap();
        let xml = context.into_output();
        assert_eq!(xml, r#"<r id="7"/>"#);

        let doc = Document::parse(&xml).unwrap();
        let mut context = unmarshal_context(Bean::new("r"));
        node.unmarshal(doc.root_element(), &mut context).unwrap();
        assert_eq!(
            context.active_bean().unwrap().get("number"),
            Some(&Value::Integer(7))
        );
    }

    #[test]
    fn test_literal_attribute() {
        let node = HandlerNode::new(AttributeHandler::literal("2.0")).named("version");
        let mut context = marshal_context(Bean::new("r"));
        context.writer_mut().start_element("r");
        node.marshal(&mut context).unwrap();
        assert_eq!(context.into_output(), r#"<r version="2.0"/>"#);
    }

    #[test]
    fn test_value_handler() {
        let node = HandlerNode::value("amount", ValueType::Float);
        let mut context = marshal_context(Bean::new("r").with("amount", Value::Float(2.5)));
        context.writer_mut().start_element("amount");
        node.marshal(&mut context).unwrap();
        assert_eq!(context.into_output(), "<amount>2.5</amount>");

        let doc = Document::parse("<amount> 3.25 </amount>").unwrap();
        let mut context = unmarshal_context(Bean::new("r"));
        node.unmarshal(doc.root_element(), &mut context).unwrap();
        assert_eq!(
            context.active_bean().unwrap().get("amount"),
            Some(&Value::Float(3.25))
        );
    }

    #[test]
    fn test_prepare_requires_name() {
        let registry = BeanRegistry::new();
        let mut handler = AttributeHandler::new("lang", ValueType::Text);
        assert!(matches!(
            handler.prepare(None, &registry),
            Err(SyncError::UnresolvedName { .. })
        ));
        assert!(handler.prepare(Some(&QName::local("lang")), &registry).is_ok());

        let mut nested = PropertyHandler::nested("address", "address");
        assert!(matches!(
            nested.prepare(None, &registry),
            Err(SyncError::UnknownBeanFactory(_))
        ));
    }
}

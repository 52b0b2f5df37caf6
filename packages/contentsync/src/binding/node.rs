//! Handler tree nodes.

use roxmltree::Node;

use super::context::{BindingContext, Direction};
use super::handler::{BindingHandler, HandlerKind};
use super::handlers::{
    AttributeHandler, ElementHandler, PropertyHandler, TupleHandler, ValueHandler,
};
use super::params::{HandlerParams, ValueState};
use crate::bean::{Bean, BeanRegistry, Value, ValueType};
use crate::error::{Result, SyncError};
use crate::xml::QName;

/// One node of a binding template.
///
/// Children are owned; handlers never need to walk back up the tree.
#[derive(Debug)]
pub struct HandlerNode {
    name: Option<QName>,
    params: HandlerParams,
    handler: Box<dyn BindingHandler>,
    children: Vec<HandlerNode>,
}

impl HandlerNode {
    /// Create an unnamed node around a handler.
    #[must_use]
    pub fn new(handler: impl BindingHandler + 'static) -> Self {
        Self {
            name: None,
            params: HandlerParams::default(),
            handler: Box::new(handler),
            children: Vec::new(),
        }
    }

    /// Element with an explicit name.
    #[must_use]
    pub fn element(name: impl Into<QName>) -> Self {
        Self::new(ElementHandler::new()).named(name)
    }

    /// Element named after the active bean.
    #[must_use]
    pub fn natural_element() -> Self {
        Self::new(ElementHandler::new())
    }

    /// Element that activates the bean bound under `bean_id`.
    #[must_use]
    pub fn bean_element(name: impl Into<QName>, bean_id: impl Into<String>) -> Self {
        Self::new(ElementHandler::for_bean(bean_id)).named(name)
    }

    /// Child element carrying the text of a bean property.
    #[must_use]
    pub fn property(name: impl Into<QName>, property: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(PropertyHandler::new(property, value_type)).named(name)
    }

    /// Property that holds the nested bean bound under `bean_id`.
    #[must_use]
    pub fn nested_bean(property: impl Into<String>, bean_id: impl Into<String>) -> Self {
        Self::new(PropertyHandler::nested(property, bean_id))
    }

    /// Attribute carrying the text of a bean property.
    #[must_use]
    pub fn attribute(name: impl Into<QName>, property: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(AttributeHandler::new(property, value_type)).named(name)
    }

    /// Text content of the enclosing element.
    #[must_use]
    pub fn value(property: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(ValueHandler::new(property, value_type))
    }

    /// Tuple element; children named `old`/`new` receive the tuple's sides.
    #[must_use]
    pub fn tuple() -> Self {
        Self::new(TupleHandler::new())
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<QName>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: HandlerParams) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: HandlerNode) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = HandlerNode>) -> Self {
        self.children.extend(children);
        self
    }

    #[must_use]
    pub fn name(&self) -> Option<&QName> {
        self.name.as_ref()
    }

    #[must_use]
    pub fn params(&self) -> &HandlerParams {
        &self.params
    }

    #[must_use]
    pub fn handler(&self) -> &dyn BindingHandler {
        self.handler.as_ref()
    }

    #[must_use]
    pub fn kind(&self) -> HandlerKind {
        self.handler.kind()
    }

    #[must_use]
    pub fn children(&self) -> &[HandlerNode] {
        &self.children
    }

    /// Short label used in errors and logs, e.g. `property <title>`.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{name}>", self.kind()),
            None => match self.handler.property() {
                Some(property) => format!("{} '{property}'", self.kind()),
                None => format!("{} (natural name)", self.kind()),
            },
        }
    }

    /// Explicit name, or the natural name of the active bean.
    ///
    /// # Errors
    /// Returns `UnresolvedName` when neither is available.
    pub fn resolve_name(&self, context: &BindingContext) -> Result<QName> {
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        context
            .active_bean()
            .and_then(natural_name)
            .ok_or_else(|| SyncError::UnresolvedName {
                handler: self.describe(),
            })
    }

    /// Decide whether this node runs, given the probed value state.
    ///
    /// A node is skipped when its operation mode is excluded, when the value
    /// is empty or absent and the matching `skip-if-*` parameter is set, or,
    /// when unmarshalling without `replace`, when the active bean already
    /// holds a non-empty value for the bound property.
    #[must_use]
    pub fn should_execute(&self, context: &BindingContext, state: ValueState) -> bool {
        if context
            .operation()
            .is_some_and(|operation| self.params.skips(operation))
        {
            return false;
        }

        match state {
            ValueState::Empty if self.params.skip_if_empty => return false,
            ValueState::Null if self.params.skip_if_null => return false,
            _ => {}
        }

        if context.direction() == Direction::Unmarshal && !self.params.replace {
            if let Some(property) = self.handler.property() {
                let occupied = context
                    .active_bean()
                    .and_then(|bean| bean.get(property))
                    .is_some_and(|value| !value.is_empty());
                if occupied {
                    return false;
                }
            }
        }

        true
    }

    /// Marshal this node if `should_execute` allows it.
    pub fn marshal(&self, context: &mut BindingContext) -> Result<()> {
        let state = self.handler.marshal_state(self, context)?;
        if !self.should_execute(context, state) {
            tracing::trace!(handler = %self.describe(), ?state, "skipping handler");
            return Ok(());
        }
        self.handler.marshal(self, context)
    }

    /// Unmarshal this node from `source` if `should_execute` allows it.
    ///
    /// # Errors
    /// Tuple nodes fail with `InvalidDirection` even when they would be
    /// skipped.
    pub fn unmarshal(&self, source: Node<'_, '_>, context: &mut BindingContext) -> Result<()> {
        if self.kind() == HandlerKind::Tuple {
            return Err(SyncError::InvalidDirection {
                handler: self.describe(),
                direction: "unmarshal".to_string(),
            });
        }
        let state = self.handler.unmarshal_state(self, source, context)?;
        if !self.should_execute(context, state) {
            tracing::trace!(handler = %self.describe(), ?state, "skipping handler");
            return Ok(());
        }
        self.handler.unmarshal(self, source, context)
    }

    /// Marshal all children: attributes first, then content in template order.
    pub(crate) fn marshal_children(&self, context: &mut BindingContext) -> Result<()> {
        self.publish_nested_beans(context);
        for child in self.attribute_children() {
            child.marshal(context)?;
        }
        for child in self.content_children() {
            child.marshal(context)?;
        }
        Ok(())
    }

    /// Unmarshal all children from `source`.
    ///
    /// Nested-bean assignments run last, after the elements that build them.
    pub(crate) fn unmarshal_children(
        &self,
        source: Node<'_, '_>,
        context: &mut BindingContext,
    ) -> Result<()> {
        let (assignments, others): (Vec<&HandlerNode>, Vec<&HandlerNode>) = self
            .children
            .iter()
            .partition(|child| child.handler.sub_bean().is_some());
        for child in others.into_iter().chain(assignments) {
            child.unmarshal(source, context)?;
        }
        Ok(())
    }

    /// Bind nested beans held by the active bean under their bean ids, so
    /// sibling elements can activate them.
    pub(crate) fn publish_nested_beans(&self, context: &mut BindingContext) {
        for child in &self.children {
            let Some((bean_id, property)) = child.handler.sub_bean() else {
                continue;
            };
            let nested = context
                .active_bean()
                .and_then(|bean| bean.get(property))
                .and_then(Value::as_bean)
                .cloned();
            if let Some(nested) = nested {
                context.bind_bean(bean_id, nested);
            }
        }
    }

    pub(crate) fn attribute_children(&self) -> impl Iterator<Item = &HandlerNode> {
        self.children
            .iter()
            .filter(|child| child.kind() == HandlerKind::Attribute)
    }

    pub(crate) fn content_children(&self) -> impl Iterator<Item = &HandlerNode> {
        self.children
            .iter()
            .filter(|child| child.kind() != HandlerKind::Attribute)
    }

    /// Start an element, declaring its namespace when it differs from the
    /// one in effect, or always under `preserve-namespace`.
    ///
    /// Returns whether a namespace was pushed; pass it to [`Self::close_element`].
    pub(crate) fn open_element(&self, name: &QName, context: &mut BindingContext) -> Result<bool> {
        let current = context.current_namespace().to_string();
        context.writer_mut().start_element(name.local_name());
        match name.namespace() {
            Some(namespace) if namespace != current => {
                context.writer_mut().default_namespace(namespace)?;
                context.push_namespace(namespace);
                Ok(true)
            }
            namespace => {
                if self.params.preserve_namespace {
                    let declared = namespace.unwrap_or(current.as_str());
                    context.writer_mut().default_namespace(declared)?;
                }
                Ok(false)
            }
        }
    }

    pub(crate) fn close_element(&self, pushed_namespace: bool, context: &mut BindingContext) {
        context.writer_mut().end_element();
        if pushed_namespace {
            context.pop_namespace();
        }
    }

    /// Validate the subtree and resolve bean factories.
    pub(crate) fn prepare(&mut self, registry: &BeanRegistry) -> Result<()> {
        let Self {
            name,
            handler,
            children,
            ..
        } = self;
        handler.prepare(name.as_ref(), registry)?;
        for child in children {
            child.prepare(registry)?;
        }
        Ok(())
    }
}

/// Element name derived from a bean: its name, in its namespace if it has one.
pub(crate) fn natural_name(bean: &Bean) -> Option<QName> {
    if bean.name().is_empty() {
        return None;
    }
    Some(match bean.namespace() {
        Some(namespace) => QName::qualified(namespace, bean.name()),
        None => QName::local(bean.name()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::Operation;
    use roxmltree::Document;

    fn unmarshal_context_with(bean: Bean) -> BindingContext {
        let mut context = BindingContext::for_unmarshal();
        context.bind_bean("root", bean);
        context.push_active("root");
        context
    }

    #[test]
    fn test_should_execute_skip_on_mode() {
        let node = HandlerNode::property("title", "title", ValueType::Text)
            .with_params(HandlerParams::new().skip_on_delete());

        let delete = BindingContext::for_marshal().with_operation(Operation::Delete);
        let insert = BindingContext::for_marshal().with_operation(Operation::Insert);
        let unset = BindingContext::for_marshal();

        assert!(!node.should_execute(&delete, ValueState::Present));
        assert!(node.should_execute(&insert, ValueState::Present));
        assert!(node.should_execute(&unset, ValueState::Present));
    }

    #[test]
    fn test_should_execute_skip_if_empty_and_null() {
        let context = BindingContext::for_marshal();
        let empty = HandlerNode::property("a", "a", ValueType::Text)
            .with_params(HandlerParams::new().skip_if_empty());
        let null = HandlerNode::property("a", "a", ValueType::Text)
            .with_params(HandlerParams::new().skip_if_null());

        assert!(!empty.should_execute(&context, ValueState::Empty));
        assert!(empty.should_execute(&context, ValueState::Null));
        assert!(!null.should_execute(&context, ValueState::Null));
        assert!(null.should_execute(&context, ValueState::Empty));
    }

    #[test]
    fn test_should_execute_merge_rule() {
        let context = unmarshal_context_with(Bean::new("report").with("title", "kept"));
        let plain = HandlerNode::property("title", "title", ValueType::Text);
        let replacing = HandlerNode::property("title", "title", ValueType::Text)
            .with_params(HandlerParams::new().replace());
        let other = HandlerNode::property("owner", "owner", ValueType::Text);

        assert!(!plain.should_execute(&context, ValueState::Present));
        assert!(replacing.should_execute(&context, ValueState::Present));
        assert!(other.should_execute(&context, ValueState::Present));
    }

    #[test]
    fn test_should_execute_skip_on_mode_when_unmarshalling() {
        let context = unmarshal_context_with(Bean::new("report"));
        let on_delete = HandlerNode::property("title", "title", ValueType::Text)
            .with_params(HandlerParams::new().skip_on_delete());
        let on_insert = HandlerNode::property("title", "title", ValueType::Text)
            .with_params(HandlerParams::new().skip_on_insert());

        let delete = context.with_operation(Operation::Delete);
        assert!(!on_delete.should_execute(&delete, ValueState::Present));
        assert!(on_insert.should_execute(&delete, ValueState::Present));

        let insert = BindingContext::for_unmarshal().with_operation(Operation::Insert);
        assert!(!on_insert.should_execute(&insert, ValueState::Present));
        assert!(on_delete.should_execute(&insert, ValueState::Present));
    }

    #[test]
    fn test_unmarshal_skip_if_empty_keeps_value() {
        let doc = Document::parse("<report><title/><owner/></report>").unwrap();
        let mut context = unmarshal_context_with(Bean::new("report"));
        let title = HandlerNode::property("title", "title", ValueType::Text)
            .with_params(HandlerParams::new().skip_if_empty());
        let owner = HandlerNode::property("owner", "owner", ValueType::Text);

        assert!(!title.should_execute(&context, ValueState::Empty));
        title.unmarshal(doc.root_element(), &mut context).unwrap();
        owner.unmarshal(doc.root_element(), &mut context).unwrap();

        let bean = context.active_bean().unwrap();
        assert_eq!(bean.get("title"), None);
        assert_eq!(bean.get("owner"), Some(&Value::from("")));
    }

    #[test]
    fn test_unmarshal_skip_on_delete_reads_nothing() {
        let doc = Document::parse("<report><title>Sales</title></report>").unwrap();
        let node = HandlerNode::property("title", "title", ValueType::Text)
            .with_params(HandlerParams::new().skip_on_delete());
        let mut context =
            unmarshal_context_with(Bean::new("report")).with_operation(Operation::Delete);

        node.unmarshal(doc.root_element(), &mut context).unwrap();
        assert_eq!(context.active_bean().unwrap().get("title"), None);
    }

    #[test]
    fn test_tuple_unmarshal_fails_even_when_skipped() {
        let doc = Document::parse("<change/>").unwrap();
        let node = HandlerNode::tuple()
            .named("change")
            .with_params(HandlerParams::new().skip_on_delete());
        let mut context = BindingContext::for_unmarshal().with_operation(Operation::Delete);

        let err = node.unmarshal(doc.root_element(), &mut context).unwrap_err();
        assert!(matches!(err, SyncError::InvalidDirection { .. }));
    }

    #[test]
    fn test_merge_rule_ignores_empty_existing_value() {
        let context = unmarshal_context_with(Bean::new("report").with("title", ""));
        let node = HandlerNode::property("title", "title", ValueType::Text);
        assert!(node.should_execute(&context, ValueState::Present));
    }

    #[test]
    fn test_resolve_name() {
        let mut context = BindingContext::for_marshal();
        let natural = HandlerNode::natural_element();
        assert!(matches!(
            natural.resolve_name(&context),
            Err(SyncError::UnresolvedName { .. })
        ));

        context.bind_bean("root", Bean::new("report").with_namespace("urn:r"));
        context.push_active("root");
        assert_eq!(
            natural.resolve_name(&context).unwrap(),
            QName::qualified("urn:r", "report")
        );
        assert_eq!(
            HandlerNode::element("explicit").resolve_name(&context).unwrap(),
            QName::local("explicit")
        );
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            HandlerNode::property("title", "title", ValueType::Text).describe(),
            "property <title>"
        );
        assert_eq!(
            HandlerNode::value("amount", ValueType::Integer).describe(),
            "value 'amount'"
        );
        assert_eq!(HandlerNode::natural_element().describe(), "element (natural name)");
    }
}

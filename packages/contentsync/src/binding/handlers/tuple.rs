//! Tuple handler: marshals a `(old, new)` content tuple into one document.

use roxmltree::Node;

use crate::binding::context::BindingContext;
use crate::binding::handler::{BindingHandler, HandlerKind};
use crate::binding::node::HandlerNode;
use crate::config::{TUPLE_BEAN, TUPLE_NEW, TUPLE_OLD};
use crate::error::{Result, SyncError};
use crate::tuple::ContentTuple;
use crate::xml::QName;

/// Handler for `<tuple>` template nodes.
///
/// Reads the tuple bound under [`TUPLE_BEAN`] and makes its write object the
/// active bean. Child nodes named `old` and `new` run against the matching
/// side only when that side exists. Marshal only.
#[derive(Debug, Clone, Default)]
pub struct TupleHandler;

impl TupleHandler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn side_bean(side: &str) -> String {
        format!("{TUPLE_BEAN}.{side}")
    }

    fn write_bean() -> String {
        Self::side_bean("write")
    }

    fn bind_sides(tuple: &ContentTuple, context: &mut BindingContext) {
        context.bind_bean(Self::write_bean(), tuple.write_object().bean().clone());
        if let Some(old) = tuple.old() {
            context.bind_bean(Self::side_bean(TUPLE_OLD), old.bean().clone());
        }
        if let Some(new) = tuple.new_object() {
            context.bind_bean(Self::side_bean(TUPLE_NEW), new.bean().clone());
        }
    }

    fn write(&self, node: &HandlerNode, tuple: &ContentTuple, context: &mut BindingContext) -> Result<()> {
        let name = node.resolve_name(context)?;
        let pushed = node.open_element(&name, context)?;

        node.publish_nested_beans(context);
        for child in node.attribute_children() {
            child.marshal(context)?;
        }
        for child in node.content_children() {
            match child.name().map(QName::local_name) {
                Some(TUPLE_OLD) => {
                    Self::marshal_side(child, TUPLE_OLD, tuple.old().is_some(), context)?;
                }
                Some(TUPLE_NEW) => {
                    Self::marshal_side(child, TUPLE_NEW, tuple.new_object().is_some(), context)?;
                }
                _ => child.marshal(context)?,
            }
        }

        node.close_element(pushed, context);
        Ok(())
    }

    fn marshal_side(
        child: &HandlerNode,
        side: &str,
        present: bool,
        context: &mut BindingContext,
    ) -> Result<()> {
        if !present {
            return Ok(());
        }
        context.push_active(Self::side_bean(side));
        let result = child.marshal(context);
        context.pop_active();
        result
    }
}

impl BindingHandler for TupleHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Tuple
    }

    fn marshal(&self, node: &HandlerNode, context: &mut BindingContext) -> Result<()> {
        let tuple = context
            .tuple(TUPLE_BEAN)
            .cloned()
            .ok_or_else(|| SyncError::MissingBean {
                bean: TUPLE_BEAN.to_string(),
                handler: node.describe(),
            })?;

        Self::bind_sides(&tuple, context);
        context.push_active(Self::write_bean());
        let result = self.write(node, &tuple, context);
        context.pop_active();
        result
    }

    fn unmarshal(
        &self,
        node: &HandlerNode,
        _source: Node<'_, '_>,
        _context: &mut BindingContext,
    ) -> Result<()> {
        Err(SyncError::InvalidDirection {
            handler: node.describe(),
            direction: "unmarshal".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::{Bean, ValueType};
    use crate::content::ContentObject;
    use crate::handle::ContentHandle;

    fn object(title: &str) -> ContentObject {
        ContentObject::new(
            ContentHandle::with_key("report", "/sales"),
            Bean::new("report").with("title", title),
        )
    }

    fn template() -> HandlerNode {
        HandlerNode::tuple()
            .named("change")
            .with_child(HandlerNode::attribute("title", "title", ValueType::Text))
            .with_child(
                HandlerNode::element(TUPLE_OLD)
                    .with_child(HandlerNode::property("title", "title", ValueType::Text)),
            )
            .with_child(
                HandlerNode::element(TUPLE_NEW)
                    .with_child(HandlerNode::property("title", "title", ValueType::Text)),
            )
    }

    fn marshal(tuple: ContentTuple) -> Result<String> {
        let mut context = BindingContext::for_marshal();
        context.bind_tuple(TUPLE_BEAN, tuple);
        template().marshal(&mut context)?;
        Ok(context.into_output())
    }

    #[test]
    fn test_update_writes_both_sides() {
        let xml = marshal(ContentTuple::update(object("Q1"), object("Q2"))).unwrap();
        assert_eq!(
            xml,
            r#"<change title="Q2"><old><title>Q1</title></old><new><title>Q2</title></new></change>"#
        );
    }

    #[test]
    fn test_insert_omits_old() {
        let xml = marshal(ContentTuple::insert(object("Q2"))).unwrap();
        assert_eq!(
            xml,
            r#"<change title="Q2"><new><title>Q2</title></new></change>"#
        );
    }

    #[test]
    fn test_delete_writes_old_as_write_object() {
        let xml = marshal(ContentTuple::delete(object("Q1"))).unwrap();
        assert_eq!(
            xml,
            r#"<change title="Q1"><old><title>Q1</title></old></change>"#
        );
    }

    #[test]
    fn test_missing_tuple() {
        let mut context = BindingContext::for_marshal();
        let err = template().marshal(&mut context).unwrap_err();
        assert!(matches!(err, SyncError::MissingBean { ref bean, .. } if bean == TUPLE_BEAN));
    }

    #[test]
    fn test_unmarshal_is_invalid() {
        let doc = roxmltree::Document::parse("<change/>").unwrap();
        let mut context = BindingContext::for_unmarshal();
        let err = template()
            .unmarshal(doc.root(), &mut context)
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidDirection { .. }));
    }
}

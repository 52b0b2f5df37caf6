//! XML binding: a tree of handlers mapping beans to XML and back.
//!
//! A template is a tree of [`HandlerNode`]s, each wrapping one
//! [`BindingHandler`]. Marshalling walks the tree and writes XML through the
//! context's writer; unmarshalling walks the same tree against a parsed
//! document and fills beans. Field-level policy (`skip-on-*`, `skip-if-*`,
//! `replace`, `preserve-namespace`) lives in [`HandlerParams`] and is applied
//! uniformly by [`HandlerNode::should_execute`].

mod context;
mod handler;
pub mod handlers;
mod node;
mod params;
mod tree;

pub use context::{BindingContext, Bound, CustomMarshaller, Direction};
pub use handler::{BindingHandler, HandlerKind};
pub use handlers::{AttributeHandler, ElementHandler, PropertyHandler, TupleHandler, ValueHandler};
pub use node::HandlerNode;
pub use params::{HandlerParams, ValueState};
pub use tree::BindingTree;

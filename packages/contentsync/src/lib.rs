//! Content synchronization core.
//!
//! This crate moves typed content objects between stores. Objects are
//! rendered to and read from XML through template-driven binding trees,
//! identified by content handles that survive renames, and written in
//! dependency order so that referenced content always exists first.
//!
//! # Example
//!
//! ```
//! use contentsync::{Bean, BeanRegistry, BindingTree, HandlerNode, ValueType};
//!
//! let template = HandlerNode::element("report")
//!     .with_child(HandlerNode::property("title", "title", ValueType::Text));
//! let tree = BindingTree::build(template, &BeanRegistry::new()).unwrap();
//!
//! let xml = tree.marshal(&Bean::new("report").with("title", "Sales"), None).unwrap();
//! assert_eq!(xml, "<report><title>Sales</title></report>");
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Constants, path key validation and run configuration
//! - [`error`]: Error types and Result alias
//! - [`telemetry`]: Tracing subscriber setup
//! - [`xml`]: Qualified names, element lookup and the XML writer
//! - [`bean`]: Property bags and bean factories
//! - [`binding`]: Handler tree that marshals beans to XML and back
//! - [`handle`]: Content types and handles
//! - [`content`]: Content objects and their references
//! - [`store`]: Per-type object stores and rename propagation
//! - [`graph`]: Dependency graph with topological ordering
//! - [`tuple`]: Write operations as `(old, new)` pairs
//! - [`reconcile`]: Source/destination matching and handle write-back
//! - [`driver`]: Read, order and write pipeline
//! - [`memory`]: In-memory XML store

pub mod bean;
pub mod binding;
pub mod config;
pub mod content;
pub mod driver;
pub mod error;
pub mod graph;
pub mod handle;
pub mod memory;
pub mod reconcile;
pub mod store;
pub mod telemetry;
pub mod tuple;
pub mod xml;

// Re-export commonly used items
pub use bean::{Bean, BeanRegistry, Value, ValueType};
pub use binding::{BindingContext, BindingTree, HandlerNode, HandlerParams};
pub use config::{validate_path_key, SyncConfig};
pub use content::ContentObject;
pub use driver::{ReadMethod, SyncDriver, SyncReport, WriteMethod};
pub use error::{ErrorScope, Result, SyncError};
pub use graph::DependencyGraph;
pub use handle::{ContentHandle, ContentType};
pub use memory::MemoryXmlStore;
pub use store::{ContentStore, ContentStores};
pub use tuple::{ContentTuple, Operation};

//! XML utilities: navigation over `roxmltree` documents and a small writer.

mod utils;
mod writer;

pub use utils::{element_children, element_text, find_child, get_tag_name, matches_name, QName};
pub use writer::XmlWriter;

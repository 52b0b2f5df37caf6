//! Minimal streaming XML writer.
//!
//! The start tag of the most recent element stays open until content is
//! written, so attributes can still be appended to it. Elements without
//! content are written self-closing.

use crate::error::{Result, SyncError};

#[derive(Debug, Default)]
pub struct XmlWriter {
    buffer: String,
    open: Vec<String>,
    start_pending: bool,
}

impl XmlWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an element.
    pub fn start_element(&mut self, name: &str) {
        self.close_start_tag();
        self.buffer.push('<');
        self.buffer.push_str(name);
        self.open.push(name.to_string());
        self.start_pending = true;
    }

    /// Add an attribute to the element opened last.
    ///
    /// # Errors
    /// Returns `AttributeOutOfOrder` once the element has content.
    pub fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        if !self.start_pending {
            return Err(SyncError::AttributeOutOfOrder {
                attribute: name.to_string(),
                element: self.open.last().cloned().unwrap_or_default(),
            });
        }
        self.buffer.push(' ');
        self.buffer.push_str(name);
        self.buffer.push_str("=\"");
        escape_into(&mut self.buffer, value, true);
        self.buffer.push('"');
        Ok(())
    }

    /// Declare the default namespace on the element opened last.
    ///
    /// # Errors
    /// Returns `AttributeOutOfOrder` once the element has content.
    pub fn default_namespace(&mut self, namespace: &str) -> Result<()> {
        self.attribute("xmlns", namespace)
    }

    /// Write character content.
    pub fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.close_start_tag();
        escape_into(&mut self.buffer, text, false);
    }

    /// Close the element opened last. Does nothing when no element is open.
    pub fn end_element(&mut self) {
        let Some(name) = self.open.pop() else {
            return;
        };
        if self.start_pending {
            self.buffer.push_str("/>");
            self.start_pending = false;
        } else {
            self.buffer.push_str("</");
            self.buffer.push_str(&name);
            self.buffer.push('>');
        }
    }

    /// Number of currently open elements.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Close all open elements and return the document.
    #[must_use]
    pub fn finish(mut self) -> String {
        while !self.open.is_empty() {
            self.end_element();
        }
        self.buffer
    }

    fn close_start_tag(&mut self) {
        if self.start_pending {
            self.buffer.push('>');
            self.start_pending = false;
        }
    }
}

fn escape_into(buffer: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => buffer.push_str("&amp;"),
            '<' => buffer.push_str("&lt;"),
            '>' => buffer.push_str("&gt;"),
            '"' if attribute => buffer.push_str("&quot;"),
            '\n' if attribute => buffer.push_str("&#10;"),
            '\t' if attribute => buffer.push_str("&#9;"),
            '\r' => buffer.push_str("&#13;"),
            _ => buffer.push(c),
        }
    }
}

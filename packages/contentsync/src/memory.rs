//! In-memory XML store.
//!
//! Keeps one XML document per content object, produced and read back
//! through the [`BindingTree`] registered for its content type. Useful as a
//! source or destination in tests and when embedding the driver.

use std::collections::{BTreeMap, HashMap};

use crate::binding::BindingTree;
use crate::content::ContentObject;
use crate::driver::{ReadMethod, WriteMethod};
use crate::error::{Result, SyncError};
use crate::handle::{ContentHandle, ContentType};
use crate::tuple::{ContentTuple, Operation};

#[derive(Debug, Clone)]
struct StoredDocument {
    handle: ContentHandle,
    parent: Option<ContentHandle>,
    children: Vec<ContentHandle>,
    xml: String,
}

/// XML-backed store implementing both read and write methods.
#[derive(Debug, Default)]
pub struct MemoryXmlStore {
    trees: HashMap<ContentType, BindingTree>,
    tuple_trees: HashMap<ContentType, BindingTree>,
    documents: BTreeMap<ContentType, Vec<StoredDocument>>,
    update_documents: Vec<String>,
    next_id: usize,
}

impl MemoryXmlStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the binding tree for objects of a content type.
    pub fn register_tree(&mut self, content_type: impl Into<ContentType>, tree: BindingTree) {
        self.trees.insert(content_type.into(), tree);
    }

    /// Register the tree that renders update tuples of a content type.
    pub fn register_tuple_tree(&mut self, content_type: impl Into<ContentType>, tree: BindingTree) {
        self.tuple_trees.insert(content_type.into(), tree);
    }

    /// Stored XML of an object.
    #[must_use]
    pub fn document(&self, handle: &ContentHandle) -> Option<&str> {
        self.find(handle).map(|document| document.xml.as_str())
    }

    /// Update documents rendered through tuple trees, oldest first.
    #[must_use]
    pub fn update_documents(&self) -> &[String] {
        &self.update_documents
    }

    /// Handles of all stored objects of a content type, in insertion order.
    #[must_use]
    pub fn handles(&self, content_type: &ContentType) -> Vec<ContentHandle> {
        self.documents
            .get(content_type)
            .map(|documents| documents.iter().map(|d| d.handle.clone()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tree(&self, content_type: &ContentType) -> Result<&BindingTree> {
        self.trees.get(content_type).ok_or_else(|| {
            SyncError::transport(content_type.as_str(), "no binding tree registered")
        })
    }

    fn find(&self, handle: &ContentHandle) -> Option<&StoredDocument> {
        self.documents
            .get(handle.content_type())?
            .iter()
            .find(|document| document.handle.matches(handle))
    }

    fn position(&self, handle: &ContentHandle) -> Option<usize> {
        self.documents
            .get(handle.content_type())?
            .iter()
            .position(|document| document.handle.matches(handle))
    }

    fn load(&self, document: &StoredDocument) -> Result<ContentObject> {
        let bean = self
            .tree(document.handle.content_type())?
            .unmarshal(&document.xml, None)?;
        let mut object = ContentObject::new(document.handle.clone(), bean);
        if let Some(parent) = &document.parent {
            object = object.with_parent(parent.clone());
        }
        for child in &document.children {
            object.add_child(child.clone());
        }
        Ok(object)
    }

    fn render(&self, object: &ContentObject, operation: Operation) -> Result<StoredDocument> {
        let xml = self
            .tree(object.content_type())?
            .marshal(object.bean(), Some(operation))?;
        Ok(StoredDocument {
            handle: object.handle().clone(),
            parent: object.parent().cloned(),
            children: object.children().to_vec(),
            xml,
        })
    }

    fn assign_id(&mut self, handle: &mut ContentHandle) {
        if handle.object_id().is_none() {
            self.next_id += 1;
            handle.set_object_id(Some(format!("{}-{}", handle.content_type(), self.next_id)));
        }
    }
}

impl ReadMethod for MemoryXmlStore {
    fn read_objects(&self, content_type: &ContentType) -> Result<Vec<ContentObject>> {
        self.documents
            .get(content_type)
            .map(|documents| documents.iter().map(|d| self.load(d)).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn read_object(&self, handle: &ContentHandle) -> Result<Option<ContentObject>> {
        self.find(handle).map(|document| self.load(document)).transpose()
    }
}

impl WriteMethod for MemoryXmlStore {
    fn insert(&mut self, object: &ContentObject) -> Result<Option<ContentObject>> {
        if !object.handle().is_set() {
            return Err(SyncError::UnsetHandle(object.content_type().to_string()));
        }
        if self.position(object.handle()).is_some() {
            return Err(SyncError::DuplicateHandle(object.handle().to_string()));
        }

        let mut document = self.render(object, Operation::Insert)?;
        self.assign_id(&mut document.handle);

        let mut stored = object.clone();
        stored.handle_mut().copy_from(&document.handle)?;
        tracing::debug!(handle = %document.handle, "stored document");

        self.documents
            .entry(object.content_type().clone())
            .or_default()
            .push(document);
        Ok(Some(stored))
    }

    fn update_object(&mut self, tuple: &ContentTuple) -> Result<Option<ContentObject>> {
        let (old, new) = match (tuple.old(), tuple.new_object()) {
            (Some(old), Some(new)) => (old, new),
            (None, Some(new)) => return self.insert(new),
            (Some(old), None) => return self.delete_object(old.handle()),
            (None, None) => return Err(SyncError::EmptyTuple),
        };
        old.handle().ensure_same_type(new.handle())?;

        let position = self
            .position(old.handle())
            .ok_or_else(|| SyncError::ObjectNotFound(old.handle().to_string()))?;

        if let Some(tuple_tree) = self.tuple_trees.get(new.content_type()) {
            let update = tuple_tree.marshal_tuple(tuple)?;
            self.update_documents.push(update);
        }

        let mut document = self.render(new, Operation::Update)?;
        let documents = self.documents.entry(new.content_type().clone()).or_default();
        if document.handle.object_id().is_none() {
            document
                .handle
                .set_object_id(documents[position].handle.object_id().map(String::from));
        }

        let mut stored = new.clone();
        stored.handle_mut().copy_from(&document.handle)?;
        documents[position] = document;
        Ok(Some(stored))
    }

    fn delete_object(&mut self, handle: &ContentHandle) -> Result<Option<ContentObject>> {
        let Some(position) = self.position(handle) else {
            return Ok(None);
        };
        let removed = match self.documents.get_mut(handle.content_type()) {
            Some(documents) => documents.remove(position),
            None => return Ok(None),
        };
        tracing::debug!(handle = %removed.handle, "removed document");
        self.load(&removed).map(Some)
    }
}

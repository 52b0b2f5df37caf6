//! Content stores: per-content-type handle registries.
//!
//! A [`ContentStore`] is an arena of content objects of one type, indexed by
//! path key and by object id. [`ContentStores`] is the set of stores known to
//! one synchronization run; rename propagation walks all of them because one
//! content type may hold references to handles of another.

use std::collections::{BTreeMap, HashMap};

use crate::config::validate_path_key;
use crate::content::ContentObject;
use crate::error::{Result, SyncError};
use crate::handle::{ContentHandle, ContentType};

type Slot = u64;

/// Table of content objects of one content type.
#[derive(Debug, Clone)]
pub struct ContentStore {
    content_type: ContentType,
    objects: BTreeMap<Slot, ContentObject>,
    by_key: HashMap<String, Slot>,
    by_id: HashMap<String, Slot>,
    next_slot: Slot,
}

impl ContentStore {
    #[must_use]
    pub fn new(content_type: impl Into<ContentType>) -> Self {
        Self {
            content_type: content_type.into(),
            objects: BTreeMap::new(),
            by_key: HashMap::new(),
            by_id: HashMap::new(),
            next_slot: 0,
        }
    }

    #[must_use]
    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ContentObject> {
        self.objects.values()
    }

    /// Register an object.
    ///
    /// # Errors
    /// - `HandleTypeMismatch` if the object belongs to another content type
    /// - `UnsetHandle` if the handle carries no identifier
    /// - `InvalidPathKey` if the path key is malformed
    /// - `DuplicateHandle` if its key or id is already registered
    pub fn insert(&mut self, object: ContentObject) -> Result<()> {
        let handle = object.handle();
        if handle.content_type() != &self.content_type {
            return Err(SyncError::HandleTypeMismatch {
                expected: self.content_type.to_string(),
                actual: handle.content_type().to_string(),
            });
        }
        if !handle.is_set() {
            return Err(SyncError::UnsetHandle(self.content_type.to_string()));
        }
        if let Some(key) = handle.path_key() {
            validate_path_key(key)?;
        }

        let key_taken = handle.path_key().is_some_and(|k| self.by_key.contains_key(k));
        let id_taken = handle.object_id().is_some_and(|i| self.by_id.contains_key(i));
        if key_taken || id_taken {
            return Err(SyncError::DuplicateHandle(handle.to_string()));
        }

        let slot = self.next_slot;
        self.next_slot += 1;
        self.index(slot, handle.clone());
        self.objects.insert(slot, object);
        Ok(())
    }

    /// Insert or replace the object registered under the same handle.
    ///
    /// # Errors
    /// Same as [`ContentStore::insert`] for the re-insert.
    pub fn upsert(&mut self, object: ContentObject) -> Result<Option<ContentObject>> {
        let previous = self.remove(object.handle());
        self.insert(object)?;
        Ok(previous)
    }

    /// Remove the object registered under `handle`.
    pub fn remove(&mut self, handle: &ContentHandle) -> Option<ContentObject> {
        let slot = self.slot_of(handle)?;
        let object = self.objects.remove(&slot)?;
        self.unindex(object.handle());
        Some(object)
    }

    #[must_use]
    pub fn get(&self, handle: &ContentHandle) -> Option<&ContentObject> {
        self.slot_of(handle).and_then(|slot| self.objects.get(&slot))
    }

    pub fn get_mut(&mut self, handle: &ContentHandle) -> Option<&mut ContentObject> {
        let slot = self.slot_of(handle)?;
        self.objects.get_mut(&slot)
    }

    #[must_use]
    pub fn contains(&self, handle: &ContentHandle) -> bool {
        self.slot_of(handle).is_some()
    }

    /// Path key registered for an object id.
    #[must_use]
    pub fn key_for_id(&self, id: &str) -> Option<&str> {
        let slot = self.by_id.get(id)?;
        self.objects.get(slot)?.handle().path_key()
    }

    /// Object id registered for a path key.
    #[must_use]
    pub fn id_for_key(&self, key: &str) -> Option<&str> {
        let slot = self.by_key.get(key)?;
        self.objects.get(slot)?.handle().object_id()
    }

    /// Complete a partial handle from the indices.
    ///
    /// Returns the handle unchanged when it is already resolved or unknown.
    #[must_use]
    pub fn resolve(&self, handle: &ContentHandle) -> ContentHandle {
        let mut resolved = handle.clone();
        if handle.is_resolved() || handle.content_type() != &self.content_type {
            return resolved;
        }
        if let Some(stored) = self.get(handle) {
            // Same type checked above, so this cannot fail.
            let _ = resolved.fill_missing(stored.handle());
        }
        resolved
    }

    /// Record a store-assigned identifier on a registered object, keeping the
    /// indices consistent.
    ///
    /// # Errors
    /// - `ObjectNotFound` if nothing is registered under `handle`
    /// - `InvalidPathKey` if `other` supplies a malformed path key
    /// - `DuplicateHandle` if the new identifiers belong to another object
    pub fn complete_handle(&mut self, handle: &ContentHandle, other: &ContentHandle) -> Result<bool> {
        let slot = self
            .slot_of(handle)
            .ok_or_else(|| SyncError::ObjectNotFound(handle.to_string()))?;

        let mut completed = handle.clone();
        if let Some(object) = self.objects.get(&slot) {
            completed.copy_from(object.handle())?;
        }
        if !completed.fill_missing(other)? {
            return Ok(false);
        }
        if let Some(key) = completed.path_key() {
            validate_path_key(key)?;
        }
        if self.owned_elsewhere(&completed, slot) {
            tracing::debug!(handle = %completed, "identifier already registered");
            return Err(SyncError::DuplicateHandle(completed.to_string()));
        }

        if let Some(object) = self.objects.get_mut(&slot) {
            object.handle_mut().copy_from(&completed)?;
        }
        self.index(slot, completed);
        Ok(true)
    }

    /// Rewrite every reference equal to `from` held by objects of this store.
    ///
    /// Returns the number of rewritten references.
    pub fn rewrite_references(&mut self, from: &ContentHandle, to: &ContentHandle) -> usize {
        self.objects
            .values_mut()
            .map(|object| object.rewrite_reference(from, to))
            .sum()
    }

    /// Whether any object of this store references `handle`.
    #[must_use]
    pub fn references(&self, handle: &ContentHandle) -> bool {
        self.objects.values().any(|object| object.references(handle))
    }

    fn slot_of(&self, handle: &ContentHandle) -> Option<Slot> {
        if handle.content_type() != &self.content_type {
            return None;
        }
        // Strict equality: key when present, id otherwise.
        match handle.path_key() {
            Some(key) => self.by_key.get(key).copied().or_else(|| {
                let slot = handle.object_id().and_then(|id| self.by_id.get(id))?;
                let stored = self.objects.get(slot)?;
                stored.handle().path_key().is_none().then_some(*slot)
            }),
            None => handle.object_id().and_then(|id| self.by_id.get(id).copied()),
        }
    }

    /// Whether either identifier of `handle` is registered to a slot other
    /// than `slot`.
    fn owned_elsewhere(&self, handle: &ContentHandle, slot: Slot) -> bool {
        let by_key = handle
            .path_key()
            .and_then(|key| self.by_key.get(key))
            .is_some_and(|owner| *owner != slot);
        let by_id = handle
            .object_id()
            .and_then(|id| self.by_id.get(id))
            .is_some_and(|owner| *owner != slot);
        by_key || by_id
    }

    fn index(&mut self, slot: Slot, handle: ContentHandle) {
        if let Some(key) = handle.path_key() {
            self.by_key.insert(key.to_string(), slot);
        }
        if let Some(id) = handle.object_id() {
            self.by_id.insert(id.to_string(), slot);
        }
    }

    fn unindex(&mut self, handle: &ContentHandle) {
        if let Some(key) = handle.path_key() {
            self.by_key.remove(key);
        }
        if let Some(id) = handle.object_id() {
            self.by_id.remove(id);
        }
    }
}

/// All content stores of one synchronization run.
#[derive(Debug, Clone, Default)]
pub struct ContentStores {
    stores: BTreeMap<ContentType, ContentStore>,
}

impl ContentStores {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The store for a content type, created on first use.
    pub fn store_mut(&mut self, content_type: &ContentType) -> &mut ContentStore {
        self.stores
            .entry(content_type.clone())
            .or_insert_with(|| ContentStore::new(content_type.clone()))
    }

    #[must_use]
    pub fn store(&self, content_type: &ContentType) -> Option<&ContentStore> {
        self.stores.get(content_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentStore> {
        self.stores.values()
    }

    /// Every object of every store.
    pub fn objects(&self) -> impl Iterator<Item = &ContentObject> {
        self.stores.values().flat_map(ContentStore::iter)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.values().map(ContentStore::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register an object in the store of its content type.
    ///
    /// # Errors
    /// See [`ContentStore::insert`].
    pub fn insert(&mut self, object: ContentObject) -> Result<()> {
        let content_type = object.content_type().clone();
        self.store_mut(&content_type).insert(object)
    }

    #[must_use]
    pub fn get(&self, handle: &ContentHandle) -> Option<&ContentObject> {
        self.stores.get(handle.content_type())?.get(handle)
    }

    pub fn get_mut(&mut self, handle: &ContentHandle) -> Option<&mut ContentObject> {
        self.stores.get_mut(handle.content_type())?.get_mut(handle)
    }

    pub fn remove(&mut self, handle: &ContentHandle) -> Option<ContentObject> {
        self.stores.get_mut(handle.content_type())?.remove(handle)
    }

    /// Complete a partial handle from the owning store's indices.
    ///
    /// Unresolvable partial handles are returned as they are.
    #[must_use]
    pub fn resolve(&self, handle: &ContentHandle) -> ContentHandle {
        match self.stores.get(handle.content_type()) {
            Some(store) => store.resolve(handle),
            None => handle.clone(),
        }
    }

    /// Rename an object and propagate the new handle to every reference.
    ///
    /// `from` is resolved first, so references holding only the other
    /// identifier are rewritten too. Every store is visited, not only the
    /// owning one. Afterwards the object
    /// is re-inserted under `to` (remove then insert) so the indices never
    /// hold the old identifiers.
    ///
    /// Returns the number of rewritten references.
    ///
    /// # Errors
    /// - `HandleTypeMismatch` if the handles have different content types
    /// - `ObjectNotFound` if nothing is registered under `from`
    /// - `InvalidPathKey` if `to` carries a malformed path key
    /// - `RenameConflict` if `to` already belongs to another object
    pub fn rename(&mut self, from: &ContentHandle, to: &ContentHandle) -> Result<usize> {
        from.ensure_same_type(to)?;
        let from = &self.resolve(from);
        if let Some(key) = to.path_key() {
            validate_path_key(key)?;
        }

        let store = self
            .stores
            .get(from.content_type())
            .ok_or_else(|| SyncError::ObjectNotFound(from.to_string()))?;
        let from_slot = store
            .slot_of(from)
            .ok_or_else(|| SyncError::ObjectNotFound(from.to_string()))?;

        if store.owned_elsewhere(to, from_slot) {
            return Err(SyncError::RenameConflict {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let rewritten: usize = self
            .stores
            .values_mut()
            .map(|store| store.rewrite_references(from, to))
            .sum();

        let store = self.store_mut(from.content_type());
        let mut object = store
            .remove(from)
            .ok_or_else(|| SyncError::ObjectNotFound(from.to_string()))?;
        let mut renamed = to.clone();
        if renamed.object_id().is_none() {
            renamed.set_object_id(object.handle().object_id().map(String::from));
        }
        object.handle_mut().copy_from(&renamed)?;
        store.insert(object)?;

        tracing::debug!(from = %from, to = %to, rewritten, "renamed content object");
        Ok(rewritten)
    }

    /// Whether any store holds a reference equal to `handle`.
    #[must_use]
    pub fn is_referenced(&self, handle: &ContentHandle) -> bool {
        self.stores.values().any(|store| store.references(handle))
    }
}

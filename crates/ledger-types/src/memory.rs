//! # In-Memory Store
//!
//! A thread-safe object map implementing [`ObjectStore`] and [`Engine`].
//! Used by single-process deployments and by tests that need two engines
//! with independent object graphs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::objects::{ObjectId, ObjectKind, Stored, StoredObject};
use crate::store::{Engine, EngineId, ObjectStore};

/// Object map keyed by `(kind, id)`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: RwLock<HashMap<(ObjectKind, ObjectId), StoredObject>>,
    refreshed: RwLock<Vec<(ObjectKind, ObjectId)>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object, returning the stored instance.
    pub fn insert<T: Stored>(&self, object: T) -> Arc<T> {
        let shared = Arc::new(object);
        let key = (T::KIND, shared.object_id());
        self.objects
            .write()
            .insert(key, T::into_stored(Arc::clone(&shared)));
        shared
    }

    /// Remove an object. Returns the removed reference, if any.
    pub fn remove(&self, kind: ObjectKind, id: &ObjectId) -> Option<StoredObject> {
        self.objects.write().remove(&(kind, *id))
    }

    /// Typed lookup.
    pub fn get<T: Stored>(&self, id: &ObjectId) -> Option<Arc<T>> {
        let objects = self.objects.read();
        objects
            .get(&(T::KIND, *id))
            .and_then(T::from_stored)
            .cloned()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Every `(kind, id)` passed to [`ObjectStore::refresh`], in call order.
    pub fn refreshed(&self) -> Vec<(ObjectKind, ObjectId)> {
        self.refreshed.read().clone()
    }
}

impl ObjectStore for InMemoryStore {
    fn find_by_id(&self, kind: ObjectKind, id: &ObjectId) -> Option<StoredObject> {
        self.objects.read().get(&(kind, *id)).cloned()
    }

    fn refresh(&self, kind: ObjectKind, id: &ObjectId) {
        self.refreshed.write().push((kind, *id));
    }
}

/// Engine backed by an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryEngine {
    id: EngineId,
    store: InMemoryStore,
    closed: AtomicBool,
}

impl InMemoryEngine {
    /// Create an engine with a fresh identity and an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(EngineId::new())
    }

    /// Create an engine with a fixed identity.
    #[must_use]
    pub fn with_id(id: EngineId) -> Self {
        Self {
            id,
            store: InMemoryStore::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// The engine's object store.
    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    /// Whether [`Engine::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryEngine {
    fn find_by_id(&self, kind: ObjectKind, id: &ObjectId) -> Option<StoredObject> {
        self.store.find_by_id(kind, id)
    }

    fn refresh(&self, kind: ObjectKind, id: &ObjectId) {
        self.store.refresh(kind, id);
    }
}

impl Engine for InMemoryEngine {
    fn uuid(&self) -> EngineId {
        self.id
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(engine = %self.id, "Engine closed");
        }
    }
}

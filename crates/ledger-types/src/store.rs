//! # Persistence and Engine Ports
//!
//! The bus never owns data. It asks the local persistence layer to look
//! objects up by durable id, and asks the local engine for its identity and
//! to close when a remote shutdown arrives.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::objects::{ObjectId, ObjectKind, StoredObject};

/// Identity of one running engine instance.
///
/// Stamped on every message as its `source`; a client uses it to recognise
/// and discard echoes of its own messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineId(pub Uuid);

impl EngineId {
    /// Generate a fresh engine identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EngineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EngineId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Id-keyed lookup into the local data store.
pub trait ObjectStore: Send + Sync {
    /// Resolve an object by kind and durable id.
    fn find_by_id(&self, kind: ObjectKind, id: &ObjectId) -> Option<StoredObject>;

    /// Reload the object with this id from the backing store, discarding any
    /// cached state. Stores without a cache need not override this.
    fn refresh(&self, _kind: ObjectKind, _id: &ObjectId) {}
}

/// The local engine a message bus serves.
pub trait Engine: ObjectStore {
    /// Identity stamped on messages this engine originates.
    fn uuid(&self) -> EngineId;

    /// Close the engine. Invoked when a remote shutdown request is relayed.
    fn close(&self);
}

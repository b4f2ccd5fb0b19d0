//! # Ledger Types Crate
//!
//! Domain entities carried by bus messages and the ports the bus needs from
//! the persistence layer.
//!
//! ## Design Principles
//!
//! - **Durable identity only**: an entity's [`ObjectId`] is the only thing
//!   that survives a process boundary. In-memory instances are never shared
//!   between engines.
//! - **Closed payload set**: message payloads are a [`StoredObject`] sum type,
//!   one variant per entity kind.
//! - **Ports, not implementations**: [`ObjectStore`] and [`Engine`] are what
//!   the bus consumes; [`memory`] provides an in-memory implementation.

pub mod datastore;
pub mod entities;
pub mod errors;
pub mod memory;
pub mod objects;
pub mod store;

pub use datastore::DataStoreType;
pub use entities::*;
pub use errors::TypeError;
pub use memory::{InMemoryEngine, InMemoryStore};
pub use objects::{ObjectId, ObjectKind, Stored, StoredObject};
pub use store::{Engine, EngineId, ObjectStore};

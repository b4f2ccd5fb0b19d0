//! # Stored Objects
//!
//! The closed set of entity kinds a message may reference, and the sum type
//! that carries one reference of any kind.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{
    Account, Budget, CommodityNode, Config, ExchangeRate, Reminder, Tag, Transaction,
};

/// Durable identity of a stored object.
pub type ObjectId = Uuid;

/// Kind of a stored object. Also the key of a message property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectKind {
    Account,
    Budget,
    Commodity,
    Config,
    ExchangeRate,
    Reminder,
    Tag,
    Transaction,
}

impl ObjectKind {
    /// All kinds, in key order.
    pub const ALL: [ObjectKind; 8] = [
        ObjectKind::Account,
        ObjectKind::Budget,
        ObjectKind::Commodity,
        ObjectKind::Config,
        ObjectKind::ExchangeRate,
        ObjectKind::Reminder,
        ObjectKind::Tag,
        ObjectKind::Transaction,
    ];
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Account => "ACCOUNT",
            ObjectKind::Budget => "BUDGET",
            ObjectKind::Commodity => "COMMODITY",
            ObjectKind::Config => "CONFIG",
            ObjectKind::ExchangeRate => "EXCHANGE_RATE",
            ObjectKind::Reminder => "REMINDER",
            ObjectKind::Tag => "TAG",
            ObjectKind::Transaction => "TRANSACTION",
        };
        f.write_str(name)
    }
}

/// A shared reference to one stored object of any kind.
///
/// Cloning is cheap: only the `Arc` is cloned, so two clones point at the
/// same in-memory instance. Use [`StoredObject::ptr_eq`] to ask whether two
/// references are the same instance, and compare [`StoredObject::uuid`] to
/// ask whether they are the same logical object.
#[derive(Debug, Clone)]
pub enum StoredObject {
    Account(Arc<Account>),
    Budget(Arc<Budget>),
    Commodity(Arc<CommodityNode>),
    Config(Arc<Config>),
    ExchangeRate(Arc<ExchangeRate>),
    Reminder(Arc<Reminder>),
    Tag(Arc<Tag>),
    Transaction(Arc<Transaction>),
}

impl StoredObject {
    /// Kind of the referenced object.
    pub fn kind(&self) -> ObjectKind {
        match self {
            StoredObject::Account(_) => ObjectKind::Account,
            StoredObject::Budget(_) => ObjectKind::Budget,
            StoredObject::Commodity(_) => ObjectKind::Commodity,
            StoredObject::Config(_) => ObjectKind::Config,
            StoredObject::ExchangeRate(_) => ObjectKind::ExchangeRate,
            StoredObject::Reminder(_) => ObjectKind::Reminder,
            StoredObject::Tag(_) => ObjectKind::Tag,
            StoredObject::Transaction(_) => ObjectKind::Transaction,
        }
    }

    /// Durable identity of the referenced object.
    pub fn uuid(&self) -> ObjectId {
        match self {
            StoredObject::Account(o) => o.uuid,
            StoredObject::Budget(o) => o.uuid,
            StoredObject::Commodity(o) => o.uuid,
            StoredObject::Config(o) => o.uuid,
            StoredObject::ExchangeRate(o) => o.uuid,
            StoredObject::Reminder(o) => o.uuid,
            StoredObject::Tag(o) => o.uuid,
            StoredObject::Transaction(o) => o.uuid,
        }
    }

    /// Whether both references point at the same in-memory instance.
    pub fn ptr_eq(&self, other: &StoredObject) -> bool {
        match (self, other) {
            (StoredObject::Account(a), StoredObject::Account(b)) => Arc::ptr_eq(a, b),
            (StoredObject::Budget(a), StoredObject::Budget(b)) => Arc::ptr_eq(a, b),
            (StoredObject::Commodity(a), StoredObject::Commodity(b)) => Arc::ptr_eq(a, b),
            (StoredObject::Config(a), StoredObject::Config(b)) => Arc::ptr_eq(a, b),
            (StoredObject::ExchangeRate(a), StoredObject::ExchangeRate(b)) => Arc::ptr_eq(a, b),
            (StoredObject::Reminder(a), StoredObject::Reminder(b)) => Arc::ptr_eq(a, b),
            (StoredObject::Tag(a), StoredObject::Tag(b)) => Arc::ptr_eq(a, b),
            (StoredObject::Transaction(a), StoredObject::Transaction(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Entity types that can travel inside a [`StoredObject`].
pub trait Stored: Send + Sync + Sized + 'static {
    /// Kind tag for this entity type.
    const KIND: ObjectKind;

    /// Durable identity.
    fn object_id(&self) -> ObjectId;

    /// Borrow the typed reference if `object` holds this entity type.
    fn from_stored(object: &StoredObject) -> Option<&Arc<Self>>;

    /// Wrap a typed reference.
    fn into_stored(this: Arc<Self>) -> StoredObject;
}

macro_rules! impl_stored {
    ($ty:ty, $variant:ident) => {
        impl Stored for $ty {
            const KIND: ObjectKind = ObjectKind::$variant;

            fn object_id(&self) -> ObjectId {
                self.uuid
            }

            fn from_stored(object: &StoredObject) -> Option<&Arc<Self>> {
                match object {
                    StoredObject::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_stored(this: Arc<Self>) -> StoredObject {
                StoredObject::$variant(this)
            }
        }

        impl From<Arc<$ty>> for StoredObject {
            fn from(value: Arc<$ty>) -> Self {
                StoredObject::$variant(value)
            }
        }

        impl From<$ty> for StoredObject {
            fn from(value: $ty) -> Self {
                StoredObject::$variant(Arc::new(value))
            }
        }
    };
}

impl_stored!(Account, Account);
impl_stored!(Budget, Budget);
impl_stored!(CommodityNode, Commodity);
impl_stored!(Config, Config);
impl_stored!(ExchangeRate, ExchangeRate);
impl_stored!(Reminder, Reminder);
impl_stored!(Tag, Tag);
impl_stored!(Transaction, Transaction);

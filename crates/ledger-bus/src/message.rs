//! # Message Model
//!
//! A [`Message`] is created by whoever performs a mutation, dispatched once
//! and discarded. It carries at most one object reference per
//! [`ObjectKind`].
//!
//! Only durable ids cross the wire. Decoding a frame yields a
//! [`RemoteMessage`], whose references are still unresolved; the client's
//! reconciliation step is the only way to turn it back into a [`Message`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ledger_types::{EngineId, ObjectId, ObjectKind, Stored, StoredObject};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::events::{ChannelEvent, MessageChannel};

/// Leading token of a domain message frame.
pub const MESSAGE_PREFIX: &str = "<Message>";

/// The unit of communication on a hub.
#[derive(Debug, Clone)]
pub struct Message {
    event: ChannelEvent,
    source: EngineId,
    properties: BTreeMap<ObjectKind, StoredObject>,
    remote: bool,
}

impl Message {
    /// Create a message with no properties.
    #[must_use]
    pub fn new(event: impl Into<ChannelEvent>, source: EngineId) -> Self {
        Self {
            event: event.into(),
            source,
            properties: BTreeMap::new(),
            remote: false,
        }
    }

    /// Attach an object, keyed by its kind.
    #[must_use]
    pub fn with_object(mut self, object: impl Into<StoredObject>) -> Self {
        self.set_object(object);
        self
    }

    /// Attach an object, replacing any object of the same kind.
    pub fn set_object(&mut self, object: impl Into<StoredObject>) -> Option<StoredObject> {
        let object = object.into();
        self.properties.insert(object.kind(), object)
    }

    /// Detach the object of a kind.
    pub fn remove_object(&mut self, kind: ObjectKind) -> Option<StoredObject> {
        self.properties.remove(&kind)
    }

    /// Channel the message is published on.
    pub fn channel(&self) -> MessageChannel {
        self.event.channel()
    }

    /// Event verb.
    pub fn event(&self) -> ChannelEvent {
        self.event
    }

    /// Identity of the engine that originated the message.
    pub fn source(&self) -> EngineId {
        self.source
    }

    /// Whether the message arrived over the wire.
    pub fn is_remote(&self) -> bool {
        self.remote
    }

    /// Set once, just before a received message is republished locally.
    pub(crate) fn mark_remote(&mut self) {
        self.remote = true;
    }

    /// Typed property access.
    pub fn get<T: Stored>(&self) -> Option<&Arc<T>> {
        self.properties.get(&T::KIND).and_then(T::from_stored)
    }

    /// Untyped property access.
    pub fn object(&self, kind: ObjectKind) -> Option<&StoredObject> {
        self.properties.get(&kind)
    }

    /// All attached objects, in kind order.
    pub fn objects(&self) -> impl Iterator<Item = &StoredObject> {
        self.properties.values()
    }

    /// Wire form: ids only.
    pub fn to_remote(&self) -> RemoteMessage {
        RemoteMessage {
            channel: self.channel(),
            event: self.event,
            source: self.source,
            properties: self
                .properties
                .values()
                .map(|object| ObjectReference {
                    kind: object.kind(),
                    id: object.uuid(),
                })
                .collect(),
        }
    }

    /// Encode as frame text.
    ///
    /// # Errors
    ///
    /// Fails only if JSON serialization fails.
    pub fn encode(&self) -> Result<String, CodecError> {
        self.to_remote().encode()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} from {}", self.channel(), self.event, self.source)?;
        if self.remote {
            f.write_str(" (remote)")?;
        }
        Ok(())
    }
}

/// Durable reference to a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectReference {
    pub kind: ObjectKind,
    pub id: ObjectId,
}

/// A message as decoded from the wire, before reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMessage {
    pub channel: MessageChannel,
    pub event: ChannelEvent,
    pub source: EngineId,
    #[serde(default)]
    pub properties: Vec<ObjectReference>,
}

impl RemoteMessage {
    /// Reference of a kind, if carried.
    pub fn reference(&self, kind: ObjectKind) -> Option<ObjectId> {
        self.properties
            .iter()
            .find(|r| r.kind == kind)
            .map(|r| r.id)
    }

    /// Encode as frame text.
    ///
    /// # Errors
    ///
    /// Fails only if JSON serialization fails.
    pub fn encode(&self) -> Result<String, CodecError> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{MESSAGE_PREFIX}{json}"))
    }

    /// Decode frame text.
    ///
    /// # Errors
    ///
    /// Rejects text without the message prefix, malformed JSON, a channel
    /// that disagrees with the event, and repeated property kinds.
    pub fn decode(text: &str) -> Result<Self, CodecError> {
        let json = text
            .strip_prefix(MESSAGE_PREFIX)
            .ok_or(CodecError::NotAMessage)?;
        let message: RemoteMessage = serde_json::from_str(json)?;

        if message.event.channel() != message.channel {
            return Err(CodecError::ChannelMismatch {
                channel: message.channel,
                event: message.event,
            });
        }

        let mut seen = Vec::with_capacity(message.properties.len());
        for reference in &message.properties {
            if seen.contains(&reference.kind) {
                return Err(CodecError::DuplicateProperty(reference.kind));
            }
            seen.push(reference.kind);
        }

        Ok(message)
    }
}

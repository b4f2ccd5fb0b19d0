//! # Error Types
//!
//! Connection establishment returns these; dispatch and relay failures are
//! logged where they happen and never reach the publisher.

use std::io;
use std::time::Duration;

use ledger_crypto::CryptoError;
use ledger_types::{ObjectKind, TypeError};
use thiserror::Error;

use crate::events::{ChannelEvent, MessageChannel};

/// Framing and message encoding errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A frame exceeded the maximum length before its delimiter.
    #[error("Frame exceeds maximum length of {max} bytes")]
    FrameTooLong { max: usize },

    /// Outbound text contained a line delimiter.
    #[error("Frame payload contains a line delimiter")]
    EmbeddedDelimiter,

    /// Inbound frame bytes are not UTF-8.
    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    /// Text does not start with the message prefix.
    #[error("Not a message frame")]
    NotAMessage,

    /// Message JSON is malformed.
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Channel field disagrees with the event.
    #[error("Event {event} does not belong to channel {channel}")]
    ChannelMismatch {
        channel: MessageChannel,
        event: ChannelEvent,
    },

    /// The same property kind appeared twice.
    #[error("Duplicate property: {0}")]
    DuplicateProperty(ObjectKind),

    /// Encryption failed on the way out.
    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),

    /// Transport error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Remote client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP connect failed.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// TCP connect did not complete in time.
    #[error("Timed out connecting to {addr} after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// Path and store type were not both received in time.
    #[error("Handshake not completed within {0:?}")]
    HandshakeTimeout(Duration),

    /// The server closed the connection before the handshake completed.
    #[error("Connection closed during handshake")]
    HandshakeAborted,

    /// The server announced a store type this client does not know.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(#[from] TypeError),

    /// The client has been disconnected.
    #[error("Not connected")]
    NotConnected,

    /// A write did not complete in time.
    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// Encoding or transport failure.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Remote server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener could not bind.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A handshake frame could not be written in time.
    #[error("Handshake write timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// A handshake frame could not be encoded or written.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Transport error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Local hub errors.
#[derive(Debug, Error)]
pub enum BusError {
    /// The hub's dispatcher has stopped.
    #[error("Message bus {0} is shut down")]
    ShutDown(String),

    /// Attaching the remote bridge failed.
    #[error("Remote bridge failed: {0}")]
    Remote(#[from] ClientError),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or not recognised.
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Result alias for hub operations.
pub type BusResult<T> = Result<T, BusError>;

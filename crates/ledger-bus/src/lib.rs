//! # Ledger Bus - Distributed Message Bus
//!
//! Keeps every engine that has the same data store open informed of changes
//! made by the others.
//!
//! ## Architecture
//!
//! ```text
//!  ┌───────────────┐                                  ┌───────────────┐
//!  │ Engine A      │                                  │ Engine B      │
//!  │  MessageBus ──┼──► MessageBusClient ──┐  ┌──────►│  MessageBus   │
//!  │   listeners   │                       ▼  │       │   listeners   │
//!  └───────────────┘               ┌──────────────────┐└───────────────┘
//!                                  │ MessageBusServer │
//!                                  │  relay to all    │
//!                                  └──────────────────┘
//! ```
//!
//! - A [`MessageBus`] dispatches to in-process listeners and, when bridged,
//!   forwards non-SYSTEM messages to a [`MessageBusServer`].
//! - The server relays every frame to every connected client.
//! - Each [`MessageBusClient`] drops its own messages, resolves the rest
//!   against its local store by durable id, and republishes them marked
//!   remote so they are never forwarded again.
//!
//! ## Wire Protocol
//!
//! Line-delimited UTF-8 text (`\r\n`, 8192 bytes max), optionally sealed
//! with a password-derived key. See [`protocol`] for the frame kinds.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

use std::time::Duration;

pub mod bus;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod listener;
pub mod message;
pub mod protocol;
pub mod reconcile;
pub mod registry;
pub mod server;

// Re-export main types
pub use bus::{BusPublisher, DispatchHandle, MessageBus};
pub use client::{ClientConfig, MessageBusClient, RemoteDatabase};
pub use codec::{FrameCodec, WireCrypto};
pub use config::{BusConfig, ServicePorts};
pub use error::{BusError, BusResult, ClientError, CodecError, ConfigError, ServerError};
pub use events::{
    AccountEvent, BudgetEvent, ChannelEvent, CommodityEvent, ConfigEvent, MessageChannel,
    ReminderEvent, SystemEvent, TagEvent, TransactionEvent, UnknownEvent,
};
pub use listener::MessageListener;
pub use message::{Message, ObjectReference, RemoteMessage};
pub use protocol::Frame;
pub use registry::{BusRegistry, DEFAULT_BUS};
pub use server::{LocalServerListener, MessageBusServer, ServerConfig};

/// Frame terminator on output. A bare `\n` is accepted on input.
pub const EOL_DELIMITER: &str = "\r\n";

/// Maximum frame length in bytes, excluding the delimiter.
pub const MAX_FRAME_LENGTH: usize = 8192;

/// Base port of the services hosted alongside a shared database.
pub const DEFAULT_PORT: u16 = 5300;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed for both handshake frames to arrive.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on any single socket write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

//! # Relay Server
//!
//! Accepts client connections and relays every inbound frame to every
//! connected client, plus the plaintext to local-only listeners.
//!
//! ## Locking
//!
//! Structural changes (connect, disconnect, listener changes, shutdown) take
//! the state lock exclusively. Relays take it shared, so the connection and
//! listener sets cannot change mid-broadcast. Handshake frames are written
//! under the exclusive lock, so a new client always sees `<PATH>` and
//! `<TYPE>` before any relayed frame.
//!
//! The originating client is included in the broadcast; clients discard
//! their own messages by source id.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::{SinkExt, StreamExt};
use ledger_crypto::DECRYPTION_ERROR_TAG;
use ledger_telemetry::metrics::{CONNECTED_CLIENTS, SERVER_FRAMES_RELAYED};
use ledger_types::DataStoreType;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::codec::{FrameCodec, WireCrypto};
use crate::error::ServerError;
use crate::protocol::{path_frame, store_type_frame, STOP_SERVER_MESSAGE};
use crate::DEFAULT_WRITE_TIMEOUT;

type FrameWriter = FramedWrite<OwnedWriteHalf, FrameCodec>;

/// In-process observer of relayed frames.
///
/// Receives decrypted frame text. Invoked while the relay holds the shared
/// lock, so implementations must not call back into the server; signal
/// another task instead.
pub trait LocalServerListener: Send + Sync {
    /// Called once per relayed frame.
    fn message_posted(&self, frame: &str);
}

/// Relay server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// `0` binds an ephemeral port; see [`MessageBusServer::local_addr`].
    pub port: u16,
    pub password: Option<String>,
    /// Announced to clients in the handshake.
    pub database_path: String,
    /// Announced to clients in the handshake.
    pub store_type: DataStoreType,
    pub write_timeout: Duration,
}

impl ServerConfig {
    /// Settings for a server mediating `database_path`.
    #[must_use]
    pub fn new(port: u16, database_path: impl Into<String>, store_type: DataStoreType) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port,
            password: None,
            database_path: database_path.into(),
            store_type,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: Option<&str>) -> Self {
        self.password = password.map(str::to_string);
        self
    }
}

struct ClientHandle {
    peer: SocketAddr,
    writer: Arc<Mutex<FrameWriter>>,
    reader: JoinHandle<()>,
}

#[derive(Default)]
struct ServerState {
    clients: HashMap<u64, ClientHandle>,
    listeners: Vec<Arc<dyn LocalServerListener>>,
    running: bool,
}

struct Shared {
    state: RwLock<ServerState>,
    crypto: WireCrypto,
    database_path: String,
    store_type: DataStoreType,
    write_timeout: Duration,
    next_id: AtomicU64,
}

/// Relay server for one shared database.
pub struct MessageBusServer {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    accept_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl MessageBusServer {
    /// Bind and start accepting clients.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the address cannot be bound.
    pub async fn start(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let shared = Arc::new(Shared {
            state: RwLock::new(ServerState {
                running: true,
                ..ServerState::default()
            }),
            crypto: WireCrypto::from_password(config.password.as_deref()),
            database_path: config.database_path,
            store_type: config.store_type,
            write_timeout: config.write_timeout,
            next_id: AtomicU64::new(1),
        });

        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&shared)));

        info!(
            addr = %local_addr,
            store_type = %shared.store_type,
            encrypted = shared.crypto.is_keyed(),
            "Message server started"
        );

        Ok(Self {
            local_addr,
            shared,
            accept_task: parking_lot::Mutex::new(Some(accept_task)),
        })
    }

    /// Bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connected clients.
    pub async fn connection_count(&self) -> usize {
        self.shared.state.read().await.clients.len()
    }

    /// Whether the server is accepting and relaying.
    pub async fn is_running(&self) -> bool {
        self.shared.state.read().await.running
    }

    /// Add an in-process observer of relayed frames.
    pub async fn add_local_listener(&self, listener: Arc<dyn LocalServerListener>) {
        self.shared.state.write().await.listeners.push(listener);
    }

    /// Remove an in-process observer. Returns `false` if it was not added.
    pub async fn remove_local_listener(&self, listener: &Arc<dyn LocalServerListener>) -> bool {
        let target = Arc::as_ptr(listener) as *const ();
        let mut state = self.shared.state.write().await;
        let before = state.listeners.len();
        state
            .listeners
            .retain(|existing| Arc::as_ptr(existing) as *const () != target);
        state.listeners.len() != before
    }

    /// Relay the shutdown request to every client and local listener, as if
    /// a client had sent it.
    pub async fn broadcast_shutdown(&self) {
        info!(addr = %self.local_addr, "Broadcasting shutdown request");
        self.shared.relay(STOP_SERVER_MESSAGE).await;
    }

    /// Close every connection, stop accepting and drop local listeners.
    /// Idempotent.
    pub async fn shutdown(&self) {
        let mut state = self.shared.state.write().await;
        if !state.running {
            return;
        }
        state.running = false;

        if let Some(accept_task) = self.accept_task.lock().take() {
            accept_task.abort();
        }

        for (id, client) in state.clients.drain() {
            client.reader.abort();
            let mut writer = client.writer.lock().await;
            let _ = timeout(
                self.shared.write_timeout,
                SinkExt::<String>::close(&mut *writer),
            )
            .await;
            debug!(connection = id, peer = %client.peer, "Connection closed");
        }
        state.listeners.clear();
        CONNECTED_CLIENTS.set(0);

        info!(addr = %self.local_addr, "Message server stopped");
    }
}

impl Drop for MessageBusServer {
    fn drop(&mut self) {
        if let Some(accept_task) = self.accept_task.get_mut().take() {
            accept_task.abort();
        }
        if let Ok(mut state) = self.shared.state.try_write() {
            for client in state.clients.values() {
                client.reader.abort();
            }
            state.clients.clear();
        }
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => Arc::clone(&shared).register(stream, peer).await,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

impl Shared {
    async fn register(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let mut state = self.state.write().await;
        if !state.running {
            return;
        }

        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        let mut writer = FramedWrite::new(write_half, FrameCodec::new());

        if let Err(e) = self.send_handshake(&mut writer).await {
            warn!(%peer, error = %e, "Handshake failed, dropping connection");
            return;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let reader = FramedRead::new(read_half, FrameCodec::new());
        let reader = tokio::spawn(Arc::clone(&self).read_loop(id, peer, reader));

        state.clients.insert(
            id,
            ClientHandle {
                peer,
                writer: Arc::new(Mutex::new(writer)),
                reader,
            },
        );
        CONNECTED_CLIENTS.set(state.clients.len() as i64);
        info!(connection = id, %peer, clients = state.clients.len(), "Client connected");
    }

    async fn send_handshake(&self, writer: &mut FrameWriter) -> Result<(), ServerError> {
        let frames = [
            path_frame(&self.database_path),
            store_type_frame(self.store_type.as_str()),
        ];
        for frame in frames {
            let frame = self.crypto.encode(&frame)?;
            timeout(self.write_timeout, writer.send(frame))
                .await
                .map_err(|_| ServerError::HandshakeTimeout(self.write_timeout))??;
        }
        Ok(())
    }

    async fn read_loop(
        self: Arc<Self>,
        id: u64,
        peer: SocketAddr,
        mut reader: FramedRead<OwnedReadHalf, FrameCodec>,
    ) {
        while let Some(frame) = reader.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(connection = id, %peer, error = %e, "Connection error, closing");
                    break;
                }
            };

            let plain = self.crypto.decode(&frame);
            if plain == DECRYPTION_ERROR_TAG {
                error!(connection = id, %peer, "Unable to decrypt frame, closing connection");
                break;
            }

            self.relay(&plain).await;
        }

        self.remove(id).await;
    }

    async fn relay(&self, plain: &str) {
        let state = self.state.read().await;
        if !state.running {
            return;
        }

        match self.crypto.encode(plain) {
            Ok(frame) => {
                let writes = state.clients.iter().map(|(id, client)| {
                    let frame = frame.as_str();
                    async move {
                        let mut writer = client.writer.lock().await;
                        match timeout(self.write_timeout, writer.send(frame)).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                warn!(connection = *id, peer = %client.peer, error = %e, "Relay write failed")
                            }
                            Err(_) => {
                                warn!(connection = *id, peer = %client.peer, "Relay write timed out")
                            }
                        }
                    }
                });
                join_all(writes).await;
                SERVER_FRAMES_RELAYED.inc();
            }
            Err(e) => error!(error = %e, "Failed to encrypt relayed frame"),
        }

        for listener in &state.listeners {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| listener.message_posted(plain)));
            if delivered.is_err() {
                error!("Local server listener panicked");
            }
        }
    }

    async fn remove(&self, id: u64) {
        let mut state = self.state.write().await;
        if let Some(client) = state.clients.remove(&id) {
            CONNECTED_CLIENTS.set(state.clients.len() as i64);
            info!(connection = id, peer = %client.peer, clients = state.clients.len(), "Client disconnected");
        }
    }
}

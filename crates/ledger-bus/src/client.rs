//! # Remote Client
//!
//! Bridges one local hub to one relay server.
//!
//! ```text
//!  socket ──► reader task ──► classify ──► <Message> ──► mpsc ──► reconcile worker ──► hub
//!                                 ├──► <PATH>/<TYPE>   update remote database
//!                                 ├──► <STOP_SERVER>   close local engine
//!                                 └──► <DECRYPTION_ERROR> stop reading
//! ```
//!
//! The reader only classifies frames; decoding, echo suppression and
//! reconciliation happen on a separate worker so slow store lookups never
//! stop the socket from being drained.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use ledger_telemetry::metrics::{CLIENT_FRAMES_RECEIVED, CLIENT_FRAMES_SENT};
use ledger_types::{DataStoreType, Engine};
use parking_lot::RwLock;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, trace, warn};

use crate::bus::BusPublisher;
use crate::codec::{FrameCodec, WireCrypto};
use crate::error::ClientError;
use crate::message::{Message, RemoteMessage};
use crate::protocol::{Frame, STOP_SERVER_MESSAGE};
use crate::reconcile::reconcile;
use crate::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_WRITE_TIMEOUT};

type FrameReader = FramedRead<OwnedReadHalf, FrameCodec>;
type FrameWriter = FramedWrite<OwnedWriteHalf, FrameCodec>;
type SharedWriter = Arc<Mutex<Option<FrameWriter>>>;

/// Connection settings for a [`MessageBusClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Frames are encrypted when set and non-empty.
    pub password: Option<String>,
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
    pub write_timeout: Duration,
}

impl ClientConfig {
    /// Settings with default timeouts and no password.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            password: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_password(mut self, password: Option<&str>) -> Self {
        self.password = password.map(str::to_string);
        self
    }

    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The database a server mediates, as pushed during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteDatabase {
    pub path: Option<String>,
    pub store_type: Option<DataStoreType>,
}

impl RemoteDatabase {
    /// Both handshake frames have been received.
    pub fn is_complete(&self) -> bool {
        self.path.is_some() && self.store_type.is_some()
    }

    /// Apply a handshake frame. Returns `true` if the frame was one.
    fn apply(&mut self, frame: &Frame<'_>) -> Result<bool, ClientError> {
        match frame {
            Frame::Path(path) => {
                debug!(path, "Remote database path");
                self.path = Some((*path).to_string());
                Ok(true)
            }
            Frame::StoreType(name) => {
                let store_type: DataStoreType = name.parse()?;
                debug!(%store_type, "Remote database type");
                self.store_type = Some(store_type);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// One open, handshaken connection.
struct Connection {
    peer: SocketAddr,
    reader: FrameReader,
    writer: FrameWriter,
    database: RemoteDatabase,
}

impl Connection {
    async fn open(config: &ClientConfig, crypto: &WireCrypto) -> Result<Self, ClientError> {
        let addr = config.address();
        let stream = timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ClientError::ConnectTimeout {
                addr: addr.clone(),
                timeout: config.connect_timeout,
            })?
            .map_err(|source| ClientError::Connect {
                addr: addr.clone(),
                source,
            })?;
        stream.set_nodelay(true).map_err(|source| ClientError::Connect {
            addr: addr.clone(),
            source,
        })?;
        let peer = stream.peer_addr().map_err(|source| ClientError::Connect {
            addr: addr.clone(),
            source,
        })?;

        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, FrameCodec::new());
        let writer = FramedWrite::new(write_half, FrameCodec::new());

        let database = timeout(config.handshake_timeout, handshake(&mut reader, crypto))
            .await
            .map_err(|_| ClientError::HandshakeTimeout(config.handshake_timeout))??;

        debug!(%peer, ?database, "Handshake complete");
        Ok(Self {
            peer,
            reader,
            writer,
            database,
        })
    }
}

/// Read frames until both the path and the store type have arrived.
async fn handshake(reader: &mut FrameReader, crypto: &WireCrypto) -> Result<RemoteDatabase, ClientError> {
    let mut database = RemoteDatabase::default();

    while !database.is_complete() {
        let frame = match reader.next().await {
            Some(frame) => frame?,
            None => return Err(ClientError::HandshakeAborted),
        };
        CLIENT_FRAMES_RECEIVED.inc();

        let plain = crypto.decode(&frame);
        let classified = Frame::classify(&plain);
        if database.apply(&classified)? {
            continue;
        }
        match classified {
            Frame::DecryptionError | Frame::Shutdown => return Err(ClientError::HandshakeAborted),
            other => warn!(frame = ?other, "Unexpected frame during handshake, dropping"),
        }
    }

    Ok(database)
}

/// Client side of the relay protocol.
pub struct MessageBusClient {
    peer: SocketAddr,
    crypto: WireCrypto,
    write_timeout: Duration,
    writer: SharedWriter,
    database: Arc<RwLock<RemoteDatabase>>,
    connected: Arc<AtomicBool>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl MessageBusClient {
    /// Connect, complete the handshake and start the receive pipeline.
    ///
    /// Reconciled messages are republished through `publisher`; the
    /// shutdown sentinel closes `engine`.
    ///
    /// # Errors
    ///
    /// Fails if the server is unreachable or the handshake does not
    /// complete within the configured timeout. No tasks are left running.
    pub async fn connect(
        config: ClientConfig,
        engine: Arc<dyn Engine>,
        publisher: BusPublisher,
    ) -> Result<Self, ClientError> {
        let crypto = WireCrypto::from_password(config.password.as_deref());
        let connection = Connection::open(&config, &crypto).await?;

        let database = Arc::new(RwLock::new(connection.database));
        let connected = Arc::new(AtomicBool::new(true));
        let writer: SharedWriter = Arc::new(Mutex::new(Some(connection.writer)));
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(
            ReaderState {
                peer: connection.peer,
                crypto: crypto.clone(),
                engine: Arc::clone(&engine),
                database: Arc::clone(&database),
                connected: Arc::clone(&connected),
                writer: Arc::clone(&writer),
                write_timeout: config.write_timeout,
            },
            connection.reader,
            messages_tx,
        ));
        let worker = tokio::spawn(reconcile_loop(engine, publisher, messages_rx));

        info!(
            peer = %connection.peer,
            encrypted = crypto.is_keyed(),
            "Connected to message server"
        );

        Ok(Self {
            peer: connection.peer,
            crypto,
            write_timeout: config.write_timeout,
            writer,
            database,
            connected,
            tasks: parking_lot::Mutex::new(vec![reader, worker]),
        })
    }

    /// Connect without a hub, ask the server to shut down, and disconnect.
    ///
    /// # Errors
    ///
    /// Fails if the connection, handshake or write fails.
    pub async fn request_server_shutdown(config: &ClientConfig) -> Result<(), ClientError> {
        let crypto = WireCrypto::from_password(config.password.as_deref());
        let mut connection = Connection::open(config, &crypto).await?;

        let frame = crypto.encode(STOP_SERVER_MESSAGE)?;
        timeout(config.write_timeout, connection.writer.send(frame))
            .await
            .map_err(|_| ClientError::WriteTimeout(config.write_timeout))??;
        CLIENT_FRAMES_SENT.inc();

        let _ = timeout(config.write_timeout, SinkExt::<String>::close(&mut connection.writer)).await;
        debug!(peer = %connection.peer, "Shutdown request sent");
        Ok(())
    }

    /// Server address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Database path and store type from the handshake.
    pub fn remote_database(&self) -> RemoteDatabase {
        self.database.read().clone()
    }

    /// Whether the connection is still open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Serialize, encrypt and write a message.
    ///
    /// # Errors
    ///
    /// Fails if the client is disconnected, encoding fails, or the write
    /// does not complete within the write timeout.
    pub async fn send_message(&self, message: &Message) -> Result<(), ClientError> {
        let text = message.encode()?;
        self.send_frame(&text).await?;
        trace!(peer = %self.peer, %message, "Message sent");
        Ok(())
    }

    /// Ask the server and every connected client to shut down.
    ///
    /// # Errors
    ///
    /// As for [`MessageBusClient::send_message`].
    pub async fn send_shutdown_request(&self) -> Result<(), ClientError> {
        self.send_frame(STOP_SERVER_MESSAGE).await
    }

    async fn send_frame(&self, text: &str) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let frame = self.crypto.encode(text)?;

        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(ClientError::NotConnected)?;
        timeout(self.write_timeout, sink.send(frame))
            .await
            .map_err(|_| ClientError::WriteTimeout(self.write_timeout))??;

        CLIENT_FRAMES_SENT.inc();
        Ok(())
    }

    /// Close the connection and stop the receive pipeline. Idempotent.
    pub async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);

        if close_writer(&self.writer, self.write_timeout).await {
            debug!(peer = %self.peer, "Disconnected from message server");
        }

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl Drop for MessageBusClient {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for MessageBusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBusClient")
            .field("peer", &self.peer)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Take the write half and close it. Returns `false` if it was already gone.
async fn close_writer(writer: &SharedWriter, write_timeout: Duration) -> bool {
    let taken = writer.lock().await.take();
    let Some(mut writer) = taken else {
        return false;
    };
    let _ = timeout(write_timeout, SinkExt::<String>::close(&mut writer)).await;
    true
}

struct ReaderState {
    peer: SocketAddr,
    crypto: WireCrypto,
    engine: Arc<dyn Engine>,
    database: Arc<RwLock<RemoteDatabase>>,
    connected: Arc<AtomicBool>,
    writer: SharedWriter,
    write_timeout: Duration,
}

async fn read_loop(
    state: ReaderState,
    mut reader: FrameReader,
    messages: mpsc::UnboundedSender<String>,
) {
    let peer = state.peer;

    while let Some(frame) = reader.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%peer, error = %e, "Connection error, closing");
                break;
            }
        };
        CLIENT_FRAMES_RECEIVED.inc();

        let plain = state.crypto.decode(&frame);
        let classified = Frame::classify(&plain);
        match classified {
            Frame::Message(text) => {
                if messages.send(text.to_string()).is_err() {
                    break;
                }
            }
            Frame::Path(_) | Frame::StoreType(_) => {
                if let Err(e) = state.database.write().apply(&classified) {
                    error!(%peer, error = %e, "Invalid control frame");
                }
            }
            Frame::DecryptionError => {
                error!(%peer, "Unable to decrypt remote message, closing connection");
                break;
            }
            Frame::Shutdown => {
                info!(%peer, "Server is shutting down");
                state.engine.close();
            }
            Frame::Unknown(text) => {
                error!(%peer, frame = text, "Unknown message");
            }
        }
    }

    state.connected.store(false, Ordering::SeqCst);
    if close_writer(&state.writer, state.write_timeout).await {
        debug!(%peer, "Write half closed");
    }
    debug!(%peer, "Reader stopped");
}

async fn reconcile_loop(
    engine: Arc<dyn Engine>,
    publisher: BusPublisher,
    mut messages: mpsc::UnboundedReceiver<String>,
) {
    let own_id = engine.uuid();

    while let Some(text) = messages.recv().await {
        let remote = match RemoteMessage::decode(&text) {
            Ok(remote) => remote,
            Err(e) => {
                warn!(bus = publisher.bus_name(), error = %e, "Dropping undecodable message");
                continue;
            }
        };

        if remote.source == own_id {
            trace!(bus = publisher.bus_name(), event = %remote.event, "Ignoring own message");
            continue;
        }

        let message = reconcile(engine.as_ref(), &remote);
        debug!(bus = publisher.bus_name(), %message, "Republishing remote message");
        publisher.publish(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn fake_server(frames: &'static [&'static str]) -> (u16, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = tokio_util::codec::Framed::new(stream, FrameCodec::new());
            for frame in frames {
                framed.send(*frame).await.unwrap();
            }
            // Hold the connection open until the client goes away.
            while framed.next().await.is_some() {}
        });
        (port, handle)
    }

    #[tokio::test]
    async fn test_handshake_reads_path_and_type() {
        let (port, _server) = fake_server(&["<PATH>/srv/books.h2", "<TYPE>H2_DATABASE"]).await;
        let config = ClientConfig::new("127.0.0.1", port);

        let connection = Connection::open(&config, &WireCrypto::plaintext())
            .await
            .unwrap();
        assert_eq!(connection.database.path.as_deref(), Some("/srv/books.h2"));
        assert_eq!(connection.database.store_type, Some(DataStoreType::H2Database));
    }

    #[tokio::test]
    async fn test_handshake_times_out_without_type() {
        let (port, _server) = fake_server(&["<PATH>/srv/books.h2"]).await;
        let config =
            ClientConfig::new("127.0.0.1", port).with_handshake_timeout(Duration::from_millis(200));

        let result = Connection::open(&config, &WireCrypto::plaintext()).await;
        assert!(matches!(result, Err(ClientError::HandshakeTimeout(_))));
    }

    #[tokio::test]
    async fn test_handshake_rejects_unknown_store_type() {
        let (port, _server) = fake_server(&["<PATH>/x", "<TYPE>DB4O"]).await;
        let config = ClientConfig::new("127.0.0.1", port);

        let result = Connection::open(&config, &WireCrypto::plaintext()).await;
        assert!(matches!(result, Err(ClientError::InvalidHandshake(_))));
    }

    #[tokio::test]
    async fn test_handshake_fails_on_wrong_key() {
        let (port, _server) = fake_server(&["<PATH>/x", "<TYPE>XML"]).await;
        let config = ClientConfig::new("127.0.0.1", port);

        // Plaintext frames never decrypt.
        let result = Connection::open(&config, &WireCrypto::from_password(Some("pw"))).await;
        assert!(matches!(result, Err(ClientError::HandshakeAborted)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = Connection::open(&ClientConfig::new("127.0.0.1", port), &WireCrypto::plaintext()).await;
        assert!(matches!(result, Err(ClientError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_decryption_error_closes_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let crypto = WireCrypto::from_password(Some("pw"));
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = tokio_util::codec::Framed::new(stream, FrameCodec::new());
            for text in ["<PATH>/srv/books.h2", "<TYPE>H2_DATABASE"] {
                framed.send(crypto.encode(text).unwrap()).await.unwrap();
            }
            framed.send("deadbeef".to_string()).await.unwrap();
            // Everything the client writes afterwards.
            let mut received = Vec::new();
            while let Some(Ok(frame)) = framed.next().await {
                received.push(frame);
            }
            received
        });

        let engine = Arc::new(ledger_types::InMemoryEngine::new());
        let bus = crate::bus::MessageBus::new("client", engine.clone());
        let config = ClientConfig::new("127.0.0.1", port).with_password(Some("pw"));
        let client = MessageBusClient::connect(config, engine.clone(), bus.publisher())
            .await
            .unwrap();

        timeout(Duration::from_secs(5), async {
            while client.is_connected() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let message = Message::new(crate::events::AccountEvent::Modify, engine.uuid());
        assert!(matches!(
            client.send_message(&message).await,
            Err(ClientError::NotConnected)
        ));

        let received = timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
        assert!(received.is_empty());
        assert!(!engine.is_closed());
    }

    #[test]
    fn test_config_address() {
        let config = ClientConfig::new("localhost", 5301).with_password(Some("pw"));
        assert_eq!(config.address(), "localhost:5301");
        assert_eq!(config.password.as_deref(), Some("pw"));
        assert_eq!(config.handshake_timeout, DEFAULT_HANDSHAKE_TIMEOUT);
    }
}

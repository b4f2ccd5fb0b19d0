//! Shared setup for the integration tests.

use std::sync::Arc;
use std::time::Duration;

use ledger_bus::{
    ClientConfig, Message, MessageBus, MessageBusServer, MessageChannel, MessageListener,
    ServerConfig,
};
use ledger_types::{DataStoreType, Engine, InMemoryEngine};
use parking_lot::Mutex;
use tokio::time::{sleep, timeout};

/// Upper bound on any single wait in the suite.
pub const WAIT: Duration = Duration::from_secs(5);

/// Path every test server announces.
pub const DATABASE_PATH: &str = "/srv/ledger/books.h2";

/// Records every message it is handed.
#[derive(Default)]
pub struct Recorder {
    seen: Mutex<Vec<Message>>,
}

impl MessageListener for Recorder {
    fn message_posted(&self, message: &Message) {
        self.seen.lock().push(message.clone());
    }
}

impl Recorder {
    pub fn messages(&self) -> Vec<Message> {
        self.seen.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    /// Wait until at least `count` messages have arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<Message> {
        timeout(WAIT, async {
            while self.len() < count {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {count} messages, got {}", self.len()));
        self.messages()
    }

    /// Assert nothing more than `count` messages arrives within `window`.
    pub async fn assert_settles_at(&self, count: usize, window: Duration) {
        sleep(window).await;
        assert_eq!(self.len(), count, "unexpected extra messages: {:?}", self.events());
    }

    pub fn events(&self) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .map(|m| m.event().to_string())
            .collect()
    }
}

/// One engine with its hub and a listener on every channel.
pub struct Node {
    pub engine: Arc<InMemoryEngine>,
    pub bus: MessageBus,
    pub recorder: Arc<Recorder>,
}

impl Node {
    pub fn new(name: &str) -> Self {
        let engine = Arc::new(InMemoryEngine::new());
        let bus = MessageBus::new(name, Arc::clone(&engine) as Arc<dyn Engine>);
        let recorder = Arc::new(Recorder::default());
        bus.register_listener(&recorder, &MessageChannel::ALL);
        Self {
            engine,
            bus,
            recorder,
        }
    }

    /// Bridge this node's hub to `server`.
    pub async fn attach(&self, server: &MessageBusServer, password: Option<&str>) {
        let port = server.local_addr().port();
        self.bus
            .attach_remote("127.0.0.1", port, password)
            .await
            .unwrap_or_else(|e| panic!("attach failed: {e}"));
    }
}

pub fn server_config(password: Option<&str>) -> ServerConfig {
    ServerConfig::new(0, DATABASE_PATH, DataStoreType::H2Database)
        .with_host("127.0.0.1")
        .with_password(password)
}

/// Start a relay on an ephemeral loopback port.
pub async fn start_server(password: Option<&str>) -> MessageBusServer {
    MessageBusServer::start(server_config(password))
        .await
        .unwrap_or_else(|e| panic!("server start failed: {e}"))
}

pub fn client_config(server: &MessageBusServer, password: Option<&str>) -> ClientConfig {
    ClientConfig::new("127.0.0.1", server.local_addr().port()).with_password(password)
}

/// Wait until the server reports `count` connections.
pub async fn wait_for_connections(server: &MessageBusServer, count: usize) {
    timeout(WAIT, async {
        while server.connection_count().await != count {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("server never reached {count} connections"));
}

//! # Local Hub
//!
//! Process-local publish/subscribe with at most one remote bridge.
//!
//! ## Dispatch
//!
//! ```text
//!  fire_event ──► mpsc ──► dispatcher task ──► listeners (in publish order)
//!                                  │
//!                                  └──► bridge ──► server   (not remote, not SYSTEM)
//! ```
//!
//! Each hub has exactly one dispatcher task, so listener invocations never
//! overlap and two messages fired in order are observed in order. Local
//! delivery always happens before the bridge write, so a stalled socket
//! cannot keep a message from local listeners.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use ledger_telemetry::metrics::MESSAGES_DISPATCHED;
use ledger_types::Engine;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::client::{ClientConfig, MessageBusClient, RemoteDatabase};
use crate::error::{BusError, BusResult};
use crate::events::MessageChannel;
use crate::listener::{downgrade, ListenerSet, MessageListener};
use crate::message::Message;

type Bridge = Arc<RwLock<Option<Arc<MessageBusClient>>>>;

struct Dispatch {
    message: Message,
    done: oneshot::Sender<()>,
}

/// Completion handle for one fired message.
#[derive(Debug)]
pub struct DispatchHandle {
    done: oneshot::Receiver<()>,
}

impl DispatchHandle {
    /// Wait until the message has been delivered and, if applicable, handed
    /// to the bridge. Returns `false` if the hub shut down first.
    pub async fn wait(self) -> bool {
        self.done.await.is_ok()
    }

    /// Blocking form of [`DispatchHandle::wait`] for non-async callers.
    ///
    /// Must not be called from within an async task.
    pub fn blocking_wait(self) -> bool {
        self.done.blocking_recv().is_ok()
    }

    /// Whether dispatch has finished, successfully or not.
    pub fn is_done(&mut self) -> bool {
        !matches!(self.done.try_recv(), Err(oneshot::error::TryRecvError::Empty))
    }
}

/// Handle that republishes into a hub without keeping the hub alive.
#[derive(Clone)]
pub struct BusPublisher {
    bus: Arc<str>,
    sender: mpsc::UnboundedSender<Dispatch>,
}

impl BusPublisher {
    /// Enqueue a message on the hub this publisher belongs to.
    pub fn publish(&self, message: Message) -> DispatchHandle {
        let (done, rx) = oneshot::channel();
        if self.sender.send(Dispatch { message, done }).is_err() {
            debug!(bus = %self.bus, "Hub is shut down, message dropped");
        }
        DispatchHandle { done: rx }
    }

    /// Name of the target hub.
    pub fn bus_name(&self) -> &str {
        &self.bus
    }
}

/// A named in-process message hub.
pub struct MessageBus {
    name: Arc<str>,
    engine: Arc<dyn Engine>,
    listeners: Arc<ListenerSet>,
    publisher: BusPublisher,
    bridge: Bridge,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl MessageBus {
    /// Create a hub serving `engine` and spawn its dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(name: impl Into<String>, engine: Arc<dyn Engine>) -> Self {
        let name: Arc<str> = Arc::from(name.into());
        let listeners = Arc::new(ListenerSet::new());
        let bridge: Bridge = Arc::new(RwLock::new(None));
        let (sender, receiver) = mpsc::unbounded_channel();

        let dispatcher = tokio::spawn(run_dispatcher(
            Arc::clone(&name),
            Arc::clone(&listeners),
            Arc::clone(&bridge),
            receiver,
        ));

        debug!(bus = %name, engine = %engine.uuid(), "Message bus created");

        Self {
            publisher: BusPublisher {
                bus: Arc::clone(&name),
                sender,
            },
            name,
            engine,
            listeners,
            bridge,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Hub name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Engine this hub serves.
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Publisher for this hub.
    pub fn publisher(&self) -> BusPublisher {
        self.publisher.clone()
    }

    // =========================================================================
    // LISTENERS
    // =========================================================================

    /// Subscribe a listener to channels. The hub holds it weakly.
    ///
    /// Registering the same listener twice on a channel is logged and
    /// ignored.
    pub fn register_listener<L: MessageListener + 'static>(
        &self,
        listener: &Arc<L>,
        channels: &[MessageChannel],
    ) {
        let weak = downgrade(listener);
        for channel in channels {
            self.listeners.register(&self.name, &weak, *channel);
        }
    }

    /// Unsubscribe a listener from channels.
    pub fn unregister_listener<L: MessageListener + 'static>(
        &self,
        listener: &Arc<L>,
        channels: &[MessageChannel],
    ) {
        let weak = downgrade(listener);
        for channel in channels {
            self.listeners.unregister(&weak, *channel);
        }
    }

    /// Registrations on a channel, including ones not yet purged.
    pub fn listener_count(&self, channel: MessageChannel) -> usize {
        self.listeners.len(channel)
    }

    // =========================================================================
    // PUBLISHING
    // =========================================================================

    /// Enqueue a message for dispatch and return immediately.
    pub fn fire_event(&self, message: Message) -> DispatchHandle {
        trace!(bus = %self.name, %message, "Event fired");
        self.publisher.publish(message)
    }

    /// Fire a message and block the calling thread until it is dispatched.
    ///
    /// Must not be called from within an async task; use
    /// [`MessageBus::fire_event_and_wait`] there.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread is driving a Tokio runtime.
    pub fn fire_blocking_event(&self, message: Message) {
        self.fire_event(message).blocking_wait();
    }

    /// Fire a message and wait until it is dispatched.
    pub async fn fire_event_and_wait(&self, message: Message) {
        self.fire_event(message).wait().await;
    }

    // =========================================================================
    // REMOTE BRIDGE
    // =========================================================================

    /// Attach a remote bridge with default timeouts.
    ///
    /// # Errors
    ///
    /// Fails if the connection or handshake fails. The hub is then
    /// local-only.
    pub async fn attach_remote(
        &self,
        host: &str,
        port: u16,
        password: Option<&str>,
    ) -> BusResult<()> {
        let config = ClientConfig::new(host, port).with_password(password);
        self.attach_remote_with(config).await
    }

    /// Attach a remote bridge, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Fails if the hub is shut down, or if the connection or handshake
    /// fails. The hub is then local-only.
    pub async fn attach_remote_with(&self, config: ClientConfig) -> BusResult<()> {
        if !self.is_running() {
            return Err(BusError::ShutDown(self.name.to_string()));
        }
        self.detach_remote().await;

        let addr = config.address();
        match MessageBusClient::connect(config, Arc::clone(&self.engine), self.publisher()).await {
            Ok(client) => {
                *self.bridge.write() = Some(Arc::new(client));
                info!(bus = %self.name, peer = %addr, "Remote bridge attached");
                Ok(())
            }
            Err(e) => {
                warn!(bus = %self.name, peer = %addr, error = %e, "Remote bridge failed, running local-only");
                Err(BusError::Remote(e))
            }
        }
    }

    /// Tear down the remote bridge, if any.
    pub async fn detach_remote(&self) {
        let client = self.bridge.write().take();
        if let Some(client) = client {
            client.disconnect().await;
            info!(bus = %self.name, "Remote bridge detached");
        }
    }

    /// Whether a connected remote bridge is attached.
    pub fn is_remote(&self) -> bool {
        self.bridge
            .read()
            .as_ref()
            .is_some_and(|client| client.is_connected())
    }

    /// Database the remote server mediates, as learned in the handshake.
    pub fn remote_database(&self) -> Option<RemoteDatabase> {
        self.bridge
            .read()
            .as_ref()
            .map(|client| client.remote_database())
    }

    /// Ask a remote server to shut down.
    ///
    /// Uses a throwaway connection; this hub's bridge is not touched.
    ///
    /// # Errors
    ///
    /// Fails if the server cannot be reached or the request cannot be sent.
    pub async fn shut_down_remote_server(
        &self,
        host: &str,
        port: u16,
        password: Option<&str>,
    ) -> BusResult<()> {
        let config = ClientConfig::new(host, port).with_password(password);
        MessageBusClient::request_server_shutdown(&config).await?;
        info!(bus = %self.name, peer = %config.address(), "Remote shutdown requested");
        Ok(())
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Detach the bridge, stop the dispatcher and drop all registrations.
    ///
    /// Messages still queued are discarded; their handles resolve to
    /// `false`.
    pub async fn shutdown(&self) {
        self.detach_remote().await;
        if let Some(dispatcher) = self.dispatcher.lock().take() {
            dispatcher.abort();
        }
        self.listeners.clear();
        debug!(bus = %self.name, "Message bus shut down");
    }

    /// Whether the dispatcher is still running.
    pub fn is_running(&self) -> bool {
        self.dispatcher
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for MessageBus {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.get_mut().take() {
            dispatcher.abort();
        }
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("name", &self.name)
            .field("engine", &self.engine.uuid())
            .finish_non_exhaustive()
    }
}

async fn run_dispatcher(
    bus: Arc<str>,
    listeners: Arc<ListenerSet>,
    bridge: Bridge,
    mut receiver: mpsc::UnboundedReceiver<Dispatch>,
) {
    while let Some(Dispatch { message, done }) = receiver.recv().await {
        deliver_local(&bus, &listeners, &message);
        forward_remote(&bus, &bridge, &message).await;
        let _ = done.send(());
    }
    debug!(bus = %bus, "Dispatcher stopped");
}

fn deliver_local(bus: &str, listeners: &ListenerSet, message: &Message) {
    let channel = message.channel();
    let mut dead = 0usize;

    for listener in listeners.snapshot(channel) {
        let Some(listener) = listener.upgrade() else {
            dead += 1;
            continue;
        };
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| listener.message_posted(message)));
        if delivered.is_err() {
            error!(bus, %channel, event = %message.event(), "Listener panicked");
        }
    }

    if dead > 0 {
        let purged = listeners.purge_dead(channel);
        trace!(bus, %channel, purged, "Purged expired listeners");
    }

    MESSAGES_DISPATCHED.inc();
}

async fn forward_remote(bus: &str, bridge: &Bridge, message: &Message) {
    if message.is_remote() || !message.channel().is_relayable() {
        return;
    }

    let client = bridge.read().clone();
    let Some(client) = client else {
        return;
    };

    if !client.is_connected() {
        let lost = {
            let mut slot = bridge.write();
            let same = slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, &client));
            if same {
                *slot = None;
            }
            same
        };
        if lost {
            warn!(bus, peer = %client.peer(), "Remote connection lost, running local-only");
        }
        return;
    }

    if let Err(e) = client.send_message(message).await {
        warn!(bus, channel = %message.channel(), event = %message.event(), error = %e, "Failed to forward message");
    }
}

//! # Relay Runtime Library
//!
//! Hosts a [`MessageBusServer`] and stops it when a client relays the
//! shutdown request. The `ledger-relay` binary is a thin wrapper.
//!
//! ## Lifecycle
//!
//! 1. Bind on the message bus port derived from the configured base port
//! 2. Watch relayed frames for `<STOP_SERVER>`
//! 3. On that frame, or on an external signal, shut the server down

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use ledger_bus::protocol::STOP_SERVER_MESSAGE;
use ledger_bus::{BusConfig, LocalServerListener, MessageBusServer};
use tokio::sync::watch;
use tracing::info;

/// Flips a watch channel when the shutdown request is relayed.
///
/// Runs under the server's relay lock, so it only signals; the runtime does
/// the actual shutdown from its own task.
struct StopListener {
    stop_tx: watch::Sender<bool>,
}

impl LocalServerListener for StopListener {
    fn message_posted(&self, frame: &str) {
        if frame == STOP_SERVER_MESSAGE {
            info!("Shutdown requested by client");
            self.stop_tx.send_replace(true);
        }
    }
}

/// A running relay server.
pub struct RelayRuntime {
    server: MessageBusServer,
    stop_rx: watch::Receiver<bool>,
}

impl RelayRuntime {
    /// Start the relay on `config.service_ports().message_bus()`.
    ///
    /// # Errors
    ///
    /// Fails if the port cannot be bound.
    pub async fn start(config: &BusConfig) -> Result<Self> {
        let port = config.service_ports().message_bus();
        Self::start_on(config, port).await
    }

    /// Start the relay on an explicit port. `0` picks an ephemeral one.
    ///
    /// # Errors
    ///
    /// Fails if the port cannot be bound.
    pub async fn start_on(config: &BusConfig, port: u16) -> Result<Self> {
        let server = MessageBusServer::start(config.server_config(port))
            .await
            .context("Failed to start message server")?;

        let (stop_tx, stop_rx) = watch::channel(false);
        server
            .add_local_listener(Arc::new(StopListener { stop_tx }))
            .await;

        info!("===========================================");
        info!("  Ledger Relay v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");
        info!(addr = %server.local_addr(), database = %config.database_path, store_type = %config.store_type, "Relay running");

        Ok(Self { server, stop_rx })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn server(&self) -> &MessageBusServer {
        &self.server
    }

    /// Resolve once a client has relayed the shutdown request.
    pub async fn stop_requested(&self) {
        let mut stop_rx = self.stop_rx.clone();
        // The sender lives in the server's listener set, which is cleared on
        // shutdown; treat that as a stop as well.
        let _ = stop_rx.wait_for(|stop| *stop).await;
    }

    /// Run until a client requests shutdown or `signal` resolves, then
    /// shut the server down.
    pub async fn run_until<F: Future<Output = ()>>(&self, signal: F) {
        tokio::select! {
            () = self.stop_requested() => {}
            () = signal => info!("Shutdown signal received"),
        }
        self.shutdown().await;
    }

    /// Stop the server. Idempotent.
    pub async fn shutdown(&self) {
        info!("Initiating relay shutdown...");
        self.server.shutdown().await;
        info!("Shutdown complete");
    }
}

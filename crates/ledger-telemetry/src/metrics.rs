//! Prometheus metrics for the message bus.
//!
//! All metrics follow the naming convention: `ledger_bus_<component>_<metric>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., frames relayed)
//! - **Gauge**: Value that can go up or down (e.g., connected clients)

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // LOCAL HUB
    // =========================================================================

    /// Messages delivered to local listeners
    pub static ref MESSAGES_DISPATCHED: IntCounter = IntCounter::new(
        "ledger_bus_hub_messages_dispatched_total",
        "Total messages dispatched by local hubs"
    ).expect("metric creation failed");

    // =========================================================================
    // REMOTE CLIENT
    // =========================================================================

    /// Frames written by clients
    pub static ref CLIENT_FRAMES_SENT: IntCounter = IntCounter::new(
        "ledger_bus_client_frames_sent_total",
        "Total frames written to the server by clients"
    ).expect("metric creation failed");

    /// Frames read by clients
    pub static ref CLIENT_FRAMES_RECEIVED: IntCounter = IntCounter::new(
        "ledger_bus_client_frames_received_total",
        "Total frames read from the server by clients"
    ).expect("metric creation failed");

    // =========================================================================
    // REMOTE SERVER
    // =========================================================================

    /// Frames relayed by the server
    pub static ref SERVER_FRAMES_RELAYED: IntCounter = IntCounter::new(
        "ledger_bus_server_frames_relayed_total",
        "Total inbound frames relayed to connected clients"
    ).expect("metric creation failed");

    /// Currently connected clients
    pub static ref CONNECTED_CLIENTS: IntGauge = IntGauge::new(
        "ledger_bus_server_connected_clients",
        "Number of currently connected clients"
    ).expect("metric creation failed");

    // =========================================================================
    // WIRE
    // =========================================================================

    /// Frames that failed to decrypt
    pub static ref DECRYPTION_FAILURES: IntCounter = IntCounter::new(
        "ledger_bus_decryption_failures_total",
        "Total frames that could not be decrypted"
    ).expect("metric creation failed");
}

/// Handle returned once metrics are registered.
pub struct MetricsHandle {
    _registry: Registry,
}

/// Register all metrics with the global registry.
///
/// Calling this more than once is harmless.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(MESSAGES_DISPATCHED.clone()),
        Box::new(CLIENT_FRAMES_SENT.clone()),
        Box::new(CLIENT_FRAMES_RECEIVED.clone()),
        Box::new(SERVER_FRAMES_RELAYED.clone()),
        Box::new(CONNECTED_CLIENTS.clone()),
        Box::new(DECRYPTION_FAILURES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: REGISTRY.clone(),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

//! # Integration Tests
//!
//! Every test runs real hubs, clients and a relay server over loopback TCP.

pub mod reconciliation;
pub mod relay;
pub mod security;
pub mod shutdown;

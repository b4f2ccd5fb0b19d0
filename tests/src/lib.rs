//! # Ledger Bus Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Servers, engines and recording listeners
//! └── integration/      # Hub ↔ client ↔ server ↔ client ↔ hub over loopback TCP
//!     ├── relay.rs
//!     ├── reconciliation.rs
//!     ├── security.rs
//!     └── shutdown.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ledger-tests
//! cargo test -p ledger-tests integration::relay::
//! ```

#![allow(dead_code)]

pub mod fixtures;
pub mod integration;

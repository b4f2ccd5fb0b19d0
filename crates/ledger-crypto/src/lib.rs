//! # Ledger Crypto - Frame Encryption
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-256 | Password → key digest |
//! | `symmetric` | XChaCha20-Poly1305, AES-256-GCM | Byte-level AEAD |
//! | `manager` | hex(nonce ‖ ciphertext) | Text frames on the wire |
//!
//! ## Security Properties
//!
//! - **Key lifetime**: derived once per client/server instance, zeroized on
//!   drop, never persisted
//! - **XChaCha20**: 192-bit random nonce per frame
//! - **Authenticated**: a wrong password or tampered frame fails to open
//!   instead of yielding garbage

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod manager;
pub mod symmetric;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{derive_key, sha256};
pub use manager::{EncryptionManager, DECRYPTION_ERROR_TAG};
pub use symmetric::{decrypt, encrypt, Cipher, Nonce, SecretKey};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # Error Types

use thiserror::Error;

/// Errors parsing shared type names.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    /// Data store type name not recognised.
    #[error("Unknown data store type: {0}")]
    UnknownStoreType(String),
}

//! # Control Frames
//!
//! Besides domain messages the wire carries two handshake frames pushed by
//! the server and two sentinels. A decrypted frame is classified by its
//! leading marker.

use ledger_crypto::DECRYPTION_ERROR_TAG;

use crate::message::MESSAGE_PREFIX;

/// Prefix of the handshake frame carrying the database path.
pub const PATH_PREFIX: &str = "<PATH>";

/// Prefix of the handshake frame carrying the data store type.
pub const DATA_STORE_TYPE_PREFIX: &str = "<TYPE>";

/// Remote shutdown request, relayed like any other frame.
pub const STOP_SERVER_MESSAGE: &str = "<STOP_SERVER>";

/// A decrypted frame, classified by its leading marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Domain message text, prefix included.
    Message(&'a str),
    /// Database path from the handshake.
    Path(&'a str),
    /// Store type name from the handshake.
    StoreType(&'a str),
    /// The frame could not be decrypted.
    DecryptionError,
    /// Remote shutdown request.
    Shutdown,
    /// Anything else.
    Unknown(&'a str),
}

impl<'a> Frame<'a> {
    /// Classify plaintext frame content.
    pub fn classify(text: &'a str) -> Self {
        if text.starts_with(MESSAGE_PREFIX) {
            Frame::Message(text)
        } else if let Some(path) = text.strip_prefix(PATH_PREFIX) {
            Frame::Path(path)
        } else if let Some(store_type) = text.strip_prefix(DATA_STORE_TYPE_PREFIX) {
            Frame::StoreType(store_type)
        } else if text.starts_with(DECRYPTION_ERROR_TAG) {
            Frame::DecryptionError
        } else if text.starts_with(STOP_SERVER_MESSAGE) {
            Frame::Shutdown
        } else {
            Frame::Unknown(text)
        }
    }
}

/// Handshake frame carrying the database path.
pub fn path_frame(path: &str) -> String {
    format!("{PATH_PREFIX}{path}")
}

/// Handshake frame carrying the data store type.
pub fn store_type_frame(store_type: &str) -> String {
    format!("{DATA_STORE_TYPE_PREFIX}{store_type}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            Frame::classify("<Message>{}"),
            Frame::Message("<Message>{}")
        );
        assert_eq!(Frame::classify("<PATH>/a/b"), Frame::Path("/a/b"));
        assert_eq!(Frame::classify("<TYPE>H2_DATABASE"), Frame::StoreType("H2_DATABASE"));
        assert_eq!(Frame::classify(DECRYPTION_ERROR_TAG), Frame::DecryptionError);
        assert_eq!(Frame::classify(STOP_SERVER_MESSAGE), Frame::Shutdown);
        assert_eq!(Frame::classify("hello"), Frame::Unknown("hello"));
    }

    #[test]
    fn test_handshake_frames() {
        assert_eq!(path_frame("/x"), "<PATH>/x");
        assert_eq!(store_type_frame("XML"), "<TYPE>XML");
        assert_eq!(Frame::classify(&path_frame("")), Frame::Path(""));
    }
}

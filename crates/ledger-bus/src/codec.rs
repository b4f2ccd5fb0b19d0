//! # Wire Codec
//!
//! Frames are UTF-8 text lines terminated by `\r\n`. [`FrameCodec`] splits
//! the byte stream into frames and bounds how much a peer can make us buffer.
//! [`WireCrypto`] seals and opens the frame text when a password is set.

use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use ledger_crypto::{EncryptionManager, DECRYPTION_ERROR_TAG};
use ledger_telemetry::metrics::DECRYPTION_FAILURES;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use crate::error::CodecError;
use crate::{EOL_DELIMITER, MAX_FRAME_LENGTH};

/// Line codec with a hard frame length bound.
///
/// The bound applies to the payload, excluding the delimiter. Input lines
/// ending in a bare `\n` are accepted.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_length: usize,
    /// Bytes already scanned for a delimiter.
    next_index: usize,
}

impl FrameCodec {
    /// Codec with the protocol's maximum frame length.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_FRAME_LENGTH)
    }

    /// Codec with a custom maximum frame length.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
        }
    }

    /// Maximum payload length.
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, CodecError> {
        let newline = buf[self.next_index..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|offset| self.next_index + offset);

        let Some(end) = newline else {
            // Leave room for a trailing '\r' that may precede the '\n'.
            if buf.len() > self.max_length + 1 {
                return Err(CodecError::FrameTooLong {
                    max: self.max_length,
                });
            }
            self.next_index = buf.len();
            return Ok(None);
        };

        self.next_index = 0;
        let line = buf.split_to(end + 1);
        let mut payload = &line[..end];
        if let Some(stripped) = payload.strip_suffix(b"\r") {
            payload = stripped;
        }

        if payload.len() > self.max_length {
            return Err(CodecError::FrameTooLong {
                max: self.max_length,
            });
        }

        std::str::from_utf8(payload)
            .map(|s| Some(s.to_string()))
            .map_err(|_| CodecError::InvalidUtf8)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, CodecError> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                if !buf.is_empty() {
                    trace!(bytes = buf.len(), "Discarding unterminated frame at EOF");
                    buf.clear();
                }
                self.next_index = 0;
                Ok(None)
            }
        }
    }
}

impl<T: AsRef<str>> Encoder<T> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), CodecError> {
        let payload = item.as_ref();
        if payload.len() > self.max_length {
            return Err(CodecError::FrameTooLong {
                max: self.max_length,
            });
        }
        if payload.contains(['\r', '\n']) {
            return Err(CodecError::EmbeddedDelimiter);
        }

        dst.reserve(payload.len() + EOL_DELIMITER.len());
        dst.put_slice(payload.as_bytes());
        dst.put_slice(EOL_DELIMITER.as_bytes());
        Ok(())
    }
}

/// Optional frame encryption shared by one client or server.
#[derive(Debug, Clone, Default)]
pub struct WireCrypto {
    manager: Option<Arc<EncryptionManager>>,
}

impl WireCrypto {
    /// Frames travel in clear.
    #[must_use]
    pub fn plaintext() -> Self {
        Self::default()
    }

    /// Key from a password. `None` or an empty password means no encryption.
    #[must_use]
    pub fn from_password(password: Option<&str>) -> Self {
        match password {
            Some(p) if !p.is_empty() => Self {
                manager: Some(Arc::new(EncryptionManager::new(p))),
            },
            _ => Self::plaintext(),
        }
    }

    /// Whether frames are encrypted.
    pub fn is_keyed(&self) -> bool {
        self.manager.is_some()
    }

    /// Prepare plaintext for the wire.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Crypto` if encryption fails.
    pub fn encode(&self, plaintext: &str) -> Result<String, CodecError> {
        match &self.manager {
            Some(manager) => Ok(manager.encrypt(plaintext)?),
            None => Ok(plaintext.to_string()),
        }
    }

    /// Recover plaintext from a wire frame.
    ///
    /// Returns [`DECRYPTION_ERROR_TAG`] instead of failing.
    pub fn decode(&self, frame: &str) -> String {
        match &self.manager {
            Some(manager) => {
                let plain = manager.decrypt(frame);
                if plain == DECRYPTION_ERROR_TAG {
                    DECRYPTION_FAILURES.inc();
                    warn!(frame_len = frame.len(), "Frame could not be decrypted");
                }
                plain
            }
            None => frame.to_string(),
        }
    }
}

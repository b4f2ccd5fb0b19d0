//! # Text Frame Encryption
//!
//! Wraps the byte-level AEAD for line-oriented transport: a sealed frame is
//! the lowercase hex of `nonce || ciphertext`, so it never contains a line
//! delimiter.

use tracing::warn;

use crate::symmetric::{self, Cipher, Nonce, SecretKey};
use crate::CryptoError;

/// Substituted for a frame's content when it cannot be decrypted.
pub const DECRYPTION_ERROR_TAG: &str = "<DECRYPTION_ERROR>";

/// Password-keyed encryptor for text frames.
///
/// The key is derived once at construction and is immutable afterwards, so a
/// manager can be shared across tasks behind an `Arc`.
#[derive(Debug, Clone)]
pub struct EncryptionManager {
    key: SecretKey,
    cipher: Cipher,
}

impl EncryptionManager {
    /// Create a manager keyed from a password using the default cipher.
    pub fn new(password: &str) -> Self {
        Self::with_cipher(password, Cipher::default())
    }

    /// Create a manager keyed from a password using a specific cipher.
    pub fn with_cipher(password: &str, cipher: Cipher) -> Self {
        Self {
            key: SecretKey::from_password(password),
            cipher,
        }
    }

    /// Cipher in use.
    pub fn cipher(&self) -> Cipher {
        self.cipher
    }

    /// Seal a plaintext frame.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::EncryptionFailed` if the cipher rejects the input.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let (ciphertext, nonce) = symmetric::encrypt(self.cipher, &self.key, plaintext.as_bytes())?;

        let mut sealed = Vec::with_capacity(nonce.as_bytes().len() + ciphertext.len());
        sealed.extend_from_slice(nonce.as_bytes());
        sealed.extend_from_slice(&ciphertext);

        Ok(hex::encode(sealed))
    }

    /// Open a sealed frame.
    ///
    /// # Errors
    ///
    /// Fails on malformed hex, truncated frames, authentication failure
    /// (wrong password or tampering), or non-UTF-8 plaintext.
    pub fn try_decrypt(&self, sealed: &str) -> Result<String, CryptoError> {
        let bytes =
            hex::decode(sealed.trim()).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;

        let nonce_len = self.cipher.nonce_len();
        if bytes.len() < nonce_len {
            return Err(CryptoError::FrameTooShort {
                expected: nonce_len,
                actual: bytes.len(),
            });
        }

        let (nonce, ciphertext) = bytes.split_at(nonce_len);
        let nonce = Nonce::from_slice(self.cipher, nonce)?;
        let plain = symmetric::decrypt(self.cipher, &self.key, ciphertext, &nonce)?;

        String::from_utf8(plain).map_err(|_| CryptoError::InvalidUtf8)
    }

    /// Open a sealed frame, substituting [`DECRYPTION_ERROR_TAG`] on failure.
    ///
    /// Never fails: the read path checks for the sentinel instead.
    pub fn decrypt(&self, sealed: &str) -> String {
        match self.try_decrypt(sealed) {
            Ok(plain) => plain,
            Err(e) => {
                warn!(error = %e, "Failed to decrypt frame");
                DECRYPTION_ERROR_TAG.to_string()
            }
        }
    }
}

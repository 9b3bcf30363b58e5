//! Crypto error types.

use thiserror::Error;

/// Errors from key derivation and payload encryption.
///
/// On the client, `KeyDerivation` is fatal at startup; `Decrypt` and its
/// friends drop the one affected message and keep the session alive.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The password hash could not be computed.
    #[error("unable to derive a key from the room password")]
    KeyDerivation,

    /// AEAD encryption failed.
    #[error("unable to encrypt message payload")]
    Encrypt,

    /// The blob is shorter than a stream header plus one sealed chunk.
    #[error("ciphertext too short ({len} bytes) to hold a stream header and one chunk")]
    TruncatedCiphertext {
        /// Observed blob length.
        len: usize,
    },

    /// Authentication failed: wrong key or tampered ciphertext.
    #[error("unable to decrypt message payload")]
    Decrypt,

    /// The chunk opened but is not marked as the stream's final chunk.
    #[error("decrypted chunk is not marked final")]
    NotFinal,
}

//! One-shot streaming AEAD for message payloads.
//!
//! Each payload is encrypted as a stream of exactly one chunk, marked
//! final. The wire blob is `stream_header ‖ chunk`: a fresh random 24-byte
//! XChaCha20 nonce up front, then the sealed chunk (plaintext plus a tag
//! byte, plus the 16-byte Poly1305 tag). A decryptor that opens the chunk
//! but does not find the final marker rejects the blob.

use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use zeroize::Zeroize;

use crate::errors::CryptoError;
use crate::kdf::RoomKey;

/// Bytes of stream header (the XChaCha20 nonce) prefixed to every blob.
pub const STREAM_HEADER_LEN: usize = 24;

/// Per-chunk overhead: one tag byte inside the chunk plus the 16-byte
/// Poly1305 authentication tag.
pub const CHUNK_OVERHEAD: usize = 1 + 16;

/// Chunk tag marking the end of a stream. Every palaver payload is a
/// single final chunk.
const CHUNK_TAG_FINAL: u8 = 0x03;

/// Encrypt one message payload.
///
/// Output length is `cleartext.len() + CHUNK_OVERHEAD + STREAM_HEADER_LEN`.
///
/// # Errors
///
/// [`CryptoError::Encrypt`] when the AEAD rejects the input (in practice
/// only for absurd lengths).
pub fn encrypt(cleartext: &[u8], key: &RoomKey) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let header = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let mut chunk = Vec::with_capacity(cleartext.len() + 1);
    chunk.extend_from_slice(cleartext);
    chunk.push(CHUNK_TAG_FINAL);

    let sealed = cipher.encrypt(&header, chunk.as_slice()).map_err(|_| CryptoError::Encrypt)?;
    chunk.zeroize();

    let mut blob = Vec::with_capacity(STREAM_HEADER_LEN + sealed.len());
    blob.extend_from_slice(header.as_slice());
    blob.extend_from_slice(&sealed);
    Ok(blob)
}

/// Decrypt one message payload.
///
/// Parses the stream header, opens exactly one chunk, and requires its tag
/// to mark the stream final.
///
/// # Errors
///
/// - [`CryptoError::TruncatedCiphertext`] when the blob cannot hold a
///   header and one sealed chunk
/// - [`CryptoError::Decrypt`] on authentication failure (wrong key, tamper)
/// - [`CryptoError::NotFinal`] when the chunk is not the stream's last
pub fn decrypt(blob: &[u8], key: &RoomKey) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < STREAM_HEADER_LEN + CHUNK_OVERHEAD {
        return Err(CryptoError::TruncatedCiphertext { len: blob.len() });
    }

    let (header, sealed) = blob.split_at(STREAM_HEADER_LEN);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut chunk =
        cipher.decrypt(XNonce::from_slice(header), sealed).map_err(|_| CryptoError::Decrypt)?;

    match chunk.pop() {
        Some(CHUNK_TAG_FINAL) => Ok(chunk),
        _ => {
            chunk.zeroize();
            Err(CryptoError::NotFinal)
        },
    }
}

//! Payload encryption for the palaver chat system.
//!
//! The server relays chat payloads without ever holding a key; only peers
//! that derived the same key from the shared room password can read them.
//! Two primitives cover the whole surface:
//!
//! ```text
//! Room password
//!        │
//!        ▼
//! Argon2id (fixed salt) → RoomKey (256-bit, shared by the room)
//!        │
//!        ▼
//! XChaCha20-Poly1305, one final chunk → header ‖ chunk on the wire
//! ```
//!
//! Key derivation is deterministic: everyone who types the same password
//! converges on the same key with no key exchange. Each encrypted message
//! carries its own fresh random 24-byte stream header (the XChaCha20
//! nonce), so encrypting the same text twice never repeats ciphertext.
//!
//! There is no ratchet and no forward secrecy; one room, one long-lived
//! key. That is the protocol's trust model, not an accident.

pub mod errors;
pub mod kdf;
pub mod stream;

pub use errors::CryptoError;
pub use kdf::{KEY_LEN, RoomKey, derive_key};
pub use stream::{CHUNK_OVERHEAD, STREAM_HEADER_LEN, decrypt, encrypt};

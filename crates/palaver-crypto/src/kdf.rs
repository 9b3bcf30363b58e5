//! Password-based key derivation.

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::CryptoError;

/// Symmetric key length (XChaCha20-Poly1305).
pub const KEY_LEN: usize = 32;

/// Fixed protocol salt. Every participant derives with the same salt so the
/// room converges on one key out-of-band.
const KDF_SALT: [u8; 16] = *b"(Q*&^#$lkjdashfg";

/// Argon2id memory cost in KiB (64 MiB).
const KDF_MEMORY_KIB: u32 = 64 * 1024;

/// Argon2id pass count.
const KDF_PASSES: u32 = 3;

/// Argon2id lane count.
const KDF_LANES: u32 = 1;

/// The room's shared 256-bit symmetric key.
///
/// Zeroed on drop. The raw bytes are exposed only for handing to the AEAD
/// and for constructing test fixtures.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RoomKey([u8; KEY_LEN]);

impl RoomKey {
    /// Wrap raw key bytes (fixtures, pre-distributed keys).
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw key material.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RoomKey(..)")
    }
}

/// Derive the room key from the shared password.
///
/// Argon2id with a moderate work factor (64 MiB, 3 passes, 1 lane) and the
/// fixed protocol salt. Deterministic: same password, same key.
///
/// # Errors
///
/// [`CryptoError::KeyDerivation`] when the hash cannot be computed.
pub fn derive_key(password: &[u8]) -> Result<RoomKey, CryptoError> {
    let params = Params::new(KDF_MEMORY_KIB, KDF_PASSES, KDF_LANES, Some(KEY_LEN))
        .map_err(|_| CryptoError::KeyDerivation)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, &KDF_SALT, &mut key)
        .map_err(|_| CryptoError::KeyDerivation)?;

    Ok(RoomKey(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let first = derive_key(b"hunter2").unwrap();
        let second = derive_key(b"hunter2").unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn different_passwords_produce_different_keys() {
        let first = derive_key(b"hunter2").unwrap();
        let second = derive_key(b"hunter3").unwrap();
        assert_ne!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn empty_password_still_derives() {
        // A terrible password is the user's prerogative.
        let key = derive_key(b"").unwrap();
        assert_ne!(key.as_bytes(), &[0u8; KEY_LEN]);
    }

    #[test]
    fn debug_does_not_leak_key_material() {
        let key = RoomKey::from_bytes([0xAB; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "RoomKey(..)");
    }
}

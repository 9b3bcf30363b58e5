//! Parsed (receive-side) view of the 166-byte frame header.
//!
//! Layout, Big Endian for multi-byte integers:
//!
//! | Offset | Len | Field              |
//! |--------|-----|--------------------|
//! | 0      | 2   | packet number      |
//! | 2      | 1   | version            |
//! | 3      | 32  | source username    |
//! | 35     | 32  | dest username      |
//! | 67     | 1   | message type       |
//! | 68     | 2   | data packet length |
//! | 70     | 32  | payload SHA-256    |
//! | 102    | 32  | reserved (zero)    |
//! | 134    | 32  | header SHA-256     |
//!
//! The header checksum covers bytes `[0, 134)`; the payload checksum covers
//! the `data_packet_length` bytes that follow the header on the wire.

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::{
    PROTOCOL_VERSION,
    errors::{ProtocolError, Result},
};

/// Size of the serialized header.
pub const HEADER_LEN: usize = 166;

/// Usable bytes of a username; the 32nd byte of the field is always NUL
/// for names this long.
pub const MAX_USERNAME_LEN: usize = 31;

/// Width of each username field.
pub(crate) const USERNAME_FIELD_LEN: usize = 32;

pub(crate) const PACKET_NUMBER: Range<usize> = 0..2;
pub(crate) const VERSION: usize = 2;
pub(crate) const SOURCE_USERNAME: Range<usize> = 3..35;
pub(crate) const DEST_USERNAME: Range<usize> = 35..67;
pub(crate) const MESSAGE_TYPE: usize = 67;
pub(crate) const DATA_PACKET_LENGTH: Range<usize> = 68..70;
pub(crate) const DATA_CHECKSUM: Range<usize> = 70..102;
pub(crate) const HEADER_CHECKSUM: Range<usize> = 134..166;

/// Bytes covered by the header checksum.
pub(crate) const CHECKSUM_COVERAGE: usize = HEADER_CHECKSUM.start;

/// SHA-256 of `bytes`, as the fixed 32-byte array stored in the header.
pub(crate) fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Copy `name` into a 32-byte username field: zero the field, copy at most
/// 31 bytes, terminate with NUL. Longer names are silently truncated; this
/// is a protocol constant, not an error.
pub(crate) fn write_username(field: &mut [u8], name: &str) {
    debug_assert_eq!(field.len(), USERNAME_FIELD_LEN);
    field.fill(0);
    let len = name.len().min(MAX_USERNAME_LEN);
    field[..len].copy_from_slice(&name.as_bytes()[..len]);
}

/// Read a username field: bytes up to (excluding) the first NUL, or the
/// whole field when no NUL is present.
pub(crate) fn read_username(field: &[u8]) -> Cow<'_, str> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end])
}

/// An immutable header whose checksum and version have been established.
///
/// The only ways to obtain one are [`ParsedHeader::parse`] (which verifies
/// both) and [`crate::HeaderBuilder::build`] (which computes the checksum it
/// stores). There is no mutable "valid" flag to invalidate.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ParsedHeader {
    bytes: [u8; HEADER_LEN],
}

impl ParsedHeader {
    /// Parse a received header.
    ///
    /// The stored checksum is compared constant-time against a fresh
    /// SHA-256 over bytes `[0, 134)`; frames from a different protocol
    /// version are rejected. The reserved region is ignored.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::HeaderChecksum`] on checksum mismatch
    /// - [`ProtocolError::UnsupportedVersion`] when the version byte is not
    ///   [`PROTOCOL_VERSION`]
    pub fn parse(bytes: [u8; HEADER_LEN]) -> Result<Self> {
        let computed = sha256(&bytes[..CHECKSUM_COVERAGE]);
        if !bool::from(computed.as_slice().ct_eq(&bytes[HEADER_CHECKSUM])) {
            return Err(ProtocolError::HeaderChecksum);
        }

        if bytes[VERSION] != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(bytes[VERSION]));
        }

        Ok(Self { bytes })
    }

    /// Parse a header from the front of `slice`.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::HeaderTooShort`] when fewer than 166 bytes are
    /// available, plus everything [`Self::parse`] rejects.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() < HEADER_LEN {
            return Err(ProtocolError::HeaderTooShort {
                expected: HEADER_LEN,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; HEADER_LEN];
        bytes.copy_from_slice(&slice[..HEADER_LEN]);
        Self::parse(bytes)
    }

    /// Constructor for headers sealed by the builder; the checksum was just
    /// computed over the same bytes, so re-verification is skipped.
    pub(crate) fn from_built(bytes: [u8; HEADER_LEN]) -> Self {
        Self { bytes }
    }

    /// The exact wire bytes, for byte-exact relay and retransmission.
    pub fn as_bytes(&self) -> &[u8; HEADER_LEN] {
        &self.bytes
    }

    /// Rolling per-direction packet number.
    pub fn packet_number(&self) -> u16 {
        u16::from_be_bytes([self.bytes[0], self.bytes[1]])
    }

    /// Protocol version byte.
    pub fn version(&self) -> u8 {
        self.bytes[VERSION]
    }

    /// Sender name, up to the first NUL of the field (lossy UTF-8).
    pub fn source_username(&self) -> Cow<'_, str> {
        read_username(&self.bytes[SOURCE_USERNAME])
    }

    /// Recipient name, up to the first NUL of the field (lossy UTF-8).
    pub fn dest_username(&self) -> Cow<'_, str> {
        read_username(&self.bytes[DEST_USERNAME])
    }

    /// Message type, decoded. Unknown values surface as a typed error.
    pub fn message_type(&self) -> Result<crate::MessageType> {
        crate::MessageType::from_u8(self.bytes[MESSAGE_TYPE])
    }

    /// Raw message type byte.
    pub fn message_type_raw(&self) -> u8 {
        self.bytes[MESSAGE_TYPE]
    }

    /// Bytes of payload that follow this header on the wire.
    pub fn data_packet_length(&self) -> u16 {
        u16::from_be_bytes([self.bytes[68], self.bytes[69]])
    }

    /// Verify the stored payload checksum against `payload`, constant-time.
    pub fn verify_data_checksum(&self, payload: &[u8]) -> bool {
        let computed = sha256(payload);
        bool::from(computed.as_slice().ct_eq(&self.bytes[DATA_CHECKSUM]))
    }
}

impl fmt::Debug for ParsedHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedHeader")
            .field("packet_number", &self.packet_number())
            .field("version", &self.version())
            .field("source_username", &self.source_username())
            .field("dest_username", &self.dest_username())
            .field("message_type", &self.message_type_raw())
            .field("data_packet_length", &self.data_packet_length())
            .finish_non_exhaustive()
    }
}

//! Protocol error types.

use thiserror::Error;

/// Convenience alias used throughout the protocol crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors surfaced while parsing or framing wire bytes.
///
/// Receivers map these onto the drop/close policy: a bad header checksum
/// or version drops the frame, an unknown message type is logged and
/// ignored, a truncated frame ends the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes than one full header.
    #[error("header too short: expected {expected} bytes, got {actual}")]
    HeaderTooShort {
        /// Required header length.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// SHA-256 over the header prefix disagrees with the stored checksum.
    #[error("header checksum mismatch")]
    HeaderChecksum,

    /// The version byte is not the protocol version this build speaks.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    /// Byte 67 does not name a known message type.
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    /// The buffer ends before the payload the header length field claims.
    #[error("frame truncated: header claims {expected} payload bytes, got {actual}")]
    FrameTruncated {
        /// Payload length claimed by the header.
        expected: usize,
        /// Payload bytes actually available.
        actual: usize,
    },
}

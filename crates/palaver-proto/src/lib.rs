//! Wire protocol for the palaver chat system.
//!
//! Every frame on the wire is a fixed 166-byte header (Big Endian, two
//! SHA-256 integrity fields) followed by `data_packet_length` bytes of
//! payload. This crate owns the byte layout and nothing else: no sockets,
//! no crypto beyond the checksums, no policy.
//!
//! The codec is split into two types so that "was this header verified?"
//! is carried by the type system instead of a mutable flag:
//!
//! - [`HeaderBuilder`] assembles outbound headers field by field and seals
//!   them with [`HeaderBuilder::build`], which computes the header checksum.
//! - [`ParsedHeader`] is only obtainable from bytes whose checksum and
//!   version already checked out (or from a builder, which produces a
//!   consistent checksum by construction).

pub mod builder;
pub mod errors;
pub mod frame;
pub mod header;

pub use builder::HeaderBuilder;
pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::{HEADER_LEN, MAX_USERNAME_LEN, ParsedHeader};

/// Current protocol version. Frames carrying any other value are rejected
/// at parse time.
pub const PROTOCOL_VERSION: u8 = 3;

/// Reserved username naming the server itself. Payloads whose source is
/// this name are cleartext server notices.
pub const SERVER_NAME: &str = "server";

/// Reserved destination addressing every connected user except the sender.
pub const BROADCAST_NAME: &str = "all";

/// Upper bound on a frame payload, fixed by the 16-bit length field.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Application message types carried in byte 67 of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Login handshake, client request and server echo.
    Login = 0,
    /// Server-to-client error report with a UTF-8 reason payload.
    Error = 1,
    /// Roster query and its reply.
    Who = 2,
    /// Positive receipt for a MESSAGE, echoing its packet number.
    Ack = 3,
    /// Directed or broadcast chat message with an opaque payload.
    Message = 4,
    /// Orderly session teardown.
    Disconnect = 5,
    /// Negative receipt: payload checksum mismatch, resend requested.
    Nack = 6,
}

impl MessageType {
    /// Decode a wire byte. Unknown values are a typed error so dispatch
    /// loops can log and ignore them.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Login),
            1 => Ok(Self::Error),
            2 => Ok(Self::Who),
            3 => Ok(Self::Ack),
            4 => Ok(Self::Message),
            5 => Ok(Self::Disconnect),
            6 => Ok(Self::Nack),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }

    /// Wire encoding of this message type.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Per-direction, per-session 16-bit packet counter.
///
/// Each transmitted frame consumes one value; the counter wraps from
/// `u16::MAX` to 0 and never resets for the life of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketCounter {
    value: u16,
}

impl PacketCounter {
    /// Counter whose next [`Self::current`] observation is `value`.
    pub fn starting_at(value: u16) -> Self {
        Self { value }
    }

    /// The most recently issued packet number.
    pub fn current(&self) -> u16 {
        self.value
    }

    /// Consume the next packet number: increment (wrapping) and return it.
    pub fn advance(&mut self) -> u16 {
        self.value = self.value.wrapping_add(1);
        self.value
    }
}

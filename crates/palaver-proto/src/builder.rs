//! Builder for outbound frame headers.

use crate::header::{
    CHECKSUM_COVERAGE, DATA_CHECKSUM, DATA_PACKET_LENGTH, DEST_USERNAME, HEADER_CHECKSUM,
    HEADER_LEN, MESSAGE_TYPE, PACKET_NUMBER, SOURCE_USERNAME, VERSION, sha256, write_username,
};
use crate::{MessageType, PROTOCOL_VERSION, ParsedHeader};

/// Chainable builder over a single reusable 166-byte buffer.
///
/// A fresh (or [`reset`](Self::reset)) builder is zero-filled apart from the
/// version byte, so zero-payload frames carry an all-zero data checksum
/// without further ceremony. Sessions keep one builder for their lifetime
/// and reset it between frames.
///
/// ```
/// use palaver_proto::{HeaderBuilder, MessageType};
///
/// let header = HeaderBuilder::new()
///     .packet_number(1)
///     .source_username("alice")
///     .dest_username("server")
///     .message_type(MessageType::Who)
///     .build();
/// assert_eq!(header.packet_number(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct HeaderBuilder {
    buf: [u8; HEADER_LEN],
}

impl Default for HeaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderBuilder {
    /// A zeroed builder speaking [`PROTOCOL_VERSION`].
    pub fn new() -> Self {
        let mut builder = Self { buf: [0u8; HEADER_LEN] };
        builder.buf[VERSION] = PROTOCOL_VERSION;
        builder
    }

    /// Zero-fill the buffer and restore the version byte.
    pub fn reset(&mut self) -> &mut Self {
        self.buf = [0u8; HEADER_LEN];
        self.buf[VERSION] = PROTOCOL_VERSION;
        self
    }

    /// Set the packet number (host order in, network order stored).
    pub fn packet_number(&mut self, number: u16) -> &mut Self {
        self.buf[PACKET_NUMBER].copy_from_slice(&number.to_be_bytes());
        self
    }

    /// Override the version byte. [`new`](Self::new) and
    /// [`reset`](Self::reset) already set the current version; this exists
    /// for tests exercising version rejection.
    pub fn version(&mut self, version: u8) -> &mut Self {
        self.buf[VERSION] = version;
        self
    }

    /// Set the source username (at most 31 bytes copied, NUL-terminated).
    pub fn source_username(&mut self, name: &str) -> &mut Self {
        write_username(&mut self.buf[SOURCE_USERNAME], name);
        self
    }

    /// Set the destination username (same truncation rules).
    pub fn dest_username(&mut self, name: &str) -> &mut Self {
        write_username(&mut self.buf[DEST_USERNAME], name);
        self
    }

    /// Set the message type byte.
    pub fn message_type(&mut self, ty: MessageType) -> &mut Self {
        self.buf[MESSAGE_TYPE] = ty.to_u8();
        self
    }

    /// Set the payload length field.
    pub fn data_packet_length(&mut self, len: u16) -> &mut Self {
        self.buf[DATA_PACKET_LENGTH].copy_from_slice(&len.to_be_bytes());
        self
    }

    /// Compute SHA-256 over `payload` into the data checksum field.
    pub fn data_checksum(&mut self, payload: &[u8]) -> &mut Self {
        self.buf[DATA_CHECKSUM].copy_from_slice(&sha256(payload));
        self
    }

    /// Set both the length field and the data checksum from `payload`.
    ///
    /// The payload must fit the 16-bit length field; callers enforce
    /// [`crate::MAX_PAYLOAD_LEN`] before building.
    pub fn payload(&mut self, payload: &[u8]) -> &mut Self {
        debug_assert!(payload.len() <= crate::MAX_PAYLOAD_LEN);
        self.data_packet_length(payload.len() as u16).data_checksum(payload)
    }

    /// Seal the header: recompute the header checksum over bytes `[0, 134)`
    /// and return the finished header by value. The builder keeps its state
    /// and may be reused (typically after [`reset`](Self::reset)).
    pub fn build(&mut self) -> ParsedHeader {
        let checksum = sha256(&self.buf[..CHECKSUM_COVERAGE]);
        self.buf[HEADER_CHECKSUM].copy_from_slice(&checksum);
        ParsedHeader::from_built(self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_header_parses() {
        let header = HeaderBuilder::new()
            .packet_number(7)
            .source_username("alice")
            .dest_username("bob")
            .message_type(MessageType::Message)
            .data_packet_length(42)
            .build();

        let parsed = ParsedHeader::parse(*header.as_bytes()).unwrap();
        assert_eq!(parsed.packet_number(), 7);
        assert_eq!(parsed.version(), PROTOCOL_VERSION);
        assert_eq!(parsed.source_username(), "alice");
        assert_eq!(parsed.dest_username(), "bob");
        assert_eq!(parsed.message_type(), Ok(MessageType::Message));
        assert_eq!(parsed.data_packet_length(), 42);
    }

    #[test]
    fn rebuild_after_mutation_is_consistent() {
        let mut builder = HeaderBuilder::new();
        let first = builder.packet_number(1).message_type(MessageType::Who).build();
        let second = builder.packet_number(2).build();

        assert!(ParsedHeader::parse(*first.as_bytes()).is_ok());
        assert!(ParsedHeader::parse(*second.as_bytes()).is_ok());
        assert_ne!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn reset_clears_previous_fields() {
        let mut builder = HeaderBuilder::new();
        builder
            .packet_number(9)
            .source_username("carol")
            .message_type(MessageType::Message)
            .data_packet_length(10);

        let header = builder.reset().message_type(MessageType::Login).build();
        assert_eq!(header.packet_number(), 0);
        assert_eq!(header.source_username(), "");
        assert_eq!(header.data_packet_length(), 0);
        assert_eq!(header.version(), PROTOCOL_VERSION);
    }

    #[test]
    fn zero_payload_frames_have_zero_data_checksum() {
        let header = HeaderBuilder::new().message_type(MessageType::Ack).build();
        assert!(header.as_bytes()[70..102].iter().all(|&b| b == 0));
    }

    #[test]
    fn payload_sets_length_and_checksum() {
        let payload = b"hello there";
        let header = HeaderBuilder::new()
            .message_type(MessageType::Message)
            .payload(payload)
            .build();

        assert_eq!(header.data_packet_length() as usize, payload.len());
        assert!(header.verify_data_checksum(payload));
        assert!(!header.verify_data_checksum(b"hello thera"));
    }
}

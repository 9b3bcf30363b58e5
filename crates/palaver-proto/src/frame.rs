//! Frame type combining a sealed header and its payload bytes.

use bytes::{BufMut, Bytes};

use crate::{
    HEADER_LEN, ParsedHeader,
    errors::{ProtocolError, Result},
};

/// One wire frame: `[header: 166 bytes] ‖ [payload: data_packet_length bytes]`.
///
/// The payload is opaque here: ciphertext for user MESSAGE frames,
/// NUL-terminated UTF-8 for server text, empty for the receipt types. There
/// is no separator and no escaping; the header's length field is the only
/// framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sealed header.
    pub header: ParsedHeader,
    /// Raw payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Pair a header with its payload.
    ///
    /// The header's length field must already match; builders set it via
    /// [`crate::HeaderBuilder::payload`] or
    /// [`crate::HeaderBuilder::data_packet_length`].
    pub fn new(header: ParsedHeader, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        debug_assert_eq!(payload.len(), header.data_packet_length() as usize);
        Self { header, payload }
    }

    /// A frame with no payload (LOGIN, ACK, NACK, DISCONNECT).
    pub fn empty(header: ParsedHeader) -> Self {
        Self::new(header, Bytes::new())
    }

    /// Append the wire encoding to `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(self.header.as_bytes());
        dst.put_slice(&self.payload);
    }

    /// Wire encoding as a fresh vector, ready for one `write_all`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(HEADER_LEN + self.payload.len());
        self.encode(&mut wire);
        wire
    }

    /// Decode a frame from a contiguous buffer, bounding the payload read
    /// by the header's length field. Trailing bytes are ignored.
    ///
    /// # Errors
    ///
    /// Everything [`ParsedHeader::from_slice`] rejects, plus
    /// [`ProtocolError::FrameTruncated`] when the buffer ends before the
    /// claimed payload does.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = ParsedHeader::from_slice(bytes)?;

        let payload_len = header.data_packet_length() as usize;
        let total = HEADER_LEN + payload_len;
        if bytes.len() < total {
            return Err(ProtocolError::FrameTruncated {
                expected: payload_len,
                actual: bytes.len() - HEADER_LEN,
            });
        }

        Ok(Self { header, payload: Bytes::copy_from_slice(&bytes[HEADER_LEN..total]) })
    }
}

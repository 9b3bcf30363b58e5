//! Client error types.

use std::io;

use palaver_crypto::CryptoError;
use palaver_proto::ProtocolError;
use thiserror::Error;

/// Errors that end the client (or one of its threads).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Malformed frame from the server.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Key derivation or payload encryption failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// An outbound packet number is already awaiting acknowledgement; the
    /// counter lapped 2^16 unacknowledged frames.
    #[error("packet number {0} is already awaiting acknowledgement")]
    PacketNumberInFlight(u16),

    /// The server NACKed a packet we hold no record of. The two sides no
    /// longer agree on what was sent; continuing would resend garbage.
    #[error("server requested a resend of unknown packet {0}")]
    ProtocolDesync(u16),
}

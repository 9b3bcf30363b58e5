//! Translation of received frames into user-visible events.

use std::io::Write;

use palaver_crypto::{RoomKey, decrypt};
use palaver_proto::{BROADCAST_NAME, MessageType, ParsedHeader, SERVER_NAME};

use crate::errors::ClientError;
use crate::tracker::OutboundTracker;

/// What one received frame means to the user (or to nobody: plain ACKs
/// produce no event at all).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The server echoed our login.
    LoggedIn,
    /// The server reported an error.
    ServerError(String),
    /// WHO reply: the comma-separated roster.
    Roster(String),
    /// A chat message, decrypted (or a cleartext server notice).
    Chat {
        /// Sender's username.
        from: String,
        /// Whether the message was addressed to the whole room.
        broadcast: bool,
        /// Message text.
        text: String,
    },
    /// An encrypted message we could not decrypt (different password).
    Undecryptable {
        /// Sender's username.
        from: String,
    },
    /// The server acknowledged a packet we no longer track.
    DuplicateAck {
        /// The acknowledged packet number.
        packet_number: u16,
    },
    /// A NACKed frame was retransmitted from the tracker.
    Retransmitted {
        /// The resent packet number.
        packet_number: u16,
    },
    /// The server ended this session.
    Disconnected,
}

/// The text of a server payload: bytes up to the first NUL, lossy UTF-8.
/// Payloads are not trusted to be NUL-terminated even though server text
/// always is.
fn text_from_payload(payload: &[u8]) -> String {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end]).into_owned()
}

/// Process one received frame.
///
/// Pure apart from the tracker and the `resend` sink: a NACK writes the
/// stored frame bytes to `resend` (the shared socket writer in the real
/// client, a buffer in tests).
///
/// # Errors
///
/// - [`ClientError::ProtocolDesync`] on a NACK for an untracked packet
/// - [`ClientError::Io`] when a retransmission cannot be written
/// - [`ClientError::Protocol`] on an unknown message type
pub fn handle_frame(
    header: &ParsedHeader,
    payload: &[u8],
    tracker: &OutboundTracker,
    key: &RoomKey,
    resend: &mut impl Write,
) -> Result<Option<ClientEvent>, ClientError> {
    match header.message_type()? {
        MessageType::Login => Ok(Some(ClientEvent::LoggedIn)),
        MessageType::Error => Ok(Some(ClientEvent::ServerError(text_from_payload(payload)))),
        MessageType::Who => Ok(Some(ClientEvent::Roster(text_from_payload(payload)))),
        MessageType::Ack => {
            let packet_number = header.packet_number();
            if tracker.acknowledge(packet_number) {
                Ok(None)
            } else {
                Ok(Some(ClientEvent::DuplicateAck { packet_number }))
            }
        },
        MessageType::Nack => {
            let packet_number = header.packet_number();
            let Some(frame) = tracker.frame_for_resend(packet_number) else {
                return Err(ClientError::ProtocolDesync(packet_number));
            };
            resend.write_all(&frame)?;
            Ok(Some(ClientEvent::Retransmitted { packet_number }))
        },
        MessageType::Message => {
            let from = header.source_username().into_owned();
            let broadcast = header.dest_username() == BROADCAST_NAME;
            if from == SERVER_NAME {
                // Server notices travel in clear.
                let text = text_from_payload(payload);
                return Ok(Some(ClientEvent::Chat { from, broadcast, text }));
            }
            match decrypt(payload, key) {
                Ok(cleartext) => {
                    let text = String::from_utf8_lossy(&cleartext).into_owned();
                    Ok(Some(ClientEvent::Chat { from, broadcast, text }))
                },
                Err(_) => Ok(Some(ClientEvent::Undecryptable { from })),
            }
        },
        MessageType::Disconnect => Ok(Some(ClientEvent::Disconnected)),
    }
}

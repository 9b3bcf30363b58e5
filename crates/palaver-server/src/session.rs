//! Per-client session: the receive loop and every server-origin reply.

use std::io::Read;
use std::net::TcpStream;
use std::sync::Arc;

use palaver_proto::{
    BROADCAST_NAME, Frame, HEADER_LEN, HeaderBuilder, MessageType, PacketCounter, ParsedHeader,
    SERVER_NAME,
};
use tracing::{debug, info, warn};

use crate::roster::{Roster, SessionHandle};

/// Packet number of the server's login response; the session counter picks
/// up from here.
pub(crate) const LOGIN_PACKET_NUMBER: u16 = 1;

/// A server text payload: the UTF-8 bytes plus a trailing NUL.
pub(crate) fn text_payload(text: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(text.len() + 1);
    payload.extend_from_slice(text.as_bytes());
    payload.push(0);
    payload
}

/// State for one logged-in client, driven by its own thread.
///
/// The session owns the read half of the socket exclusively; its write
/// half lives in the [`SessionHandle`] shared through the roster, so
/// replies to this client and fan-out from other sessions serialise on
/// the same output mutex.
pub struct Session {
    username: String,
    reader: TcpStream,
    handle: Arc<SessionHandle>,
    roster: Arc<Roster>,
    builder: HeaderBuilder,
    counter: PacketCounter,
}

impl Session {
    /// Assemble a session for a freshly admitted client. `builder` is the
    /// codec the login procedure already used; it moves in here and serves
    /// every frame this session originates.
    pub fn new(
        username: String,
        reader: TcpStream,
        handle: Arc<SessionHandle>,
        roster: Arc<Roster>,
        builder: HeaderBuilder,
    ) -> Self {
        Self {
            username,
            reader,
            handle,
            roster,
            builder,
            counter: PacketCounter::starting_at(LOGIN_PACKET_NUMBER),
        }
    }

    /// Run the session to completion: announce the join, then process
    /// frames in wire order until EOF, a transport error, or DISCONNECT.
    /// The caller removes the roster entry once this returns.
    pub fn run(mut self) {
        info!(user = %self.username, "session started");
        self.broadcast_notice(&format!("User: {} entered the room.", self.username));

        loop {
            let mut bytes = [0u8; HEADER_LEN];
            if let Err(err) = self.reader.read_exact(&mut bytes) {
                info!(user = %self.username, %err, "client socket closed");
                return;
            }

            let header = match ParsedHeader::parse(bytes) {
                Ok(header) => header,
                Err(err) => {
                    warn!(user = %self.username, %err, "dropping frame");
                    continue;
                },
            };

            let message_type = match header.message_type() {
                Ok(ty) => ty,
                Err(err) => {
                    warn!(user = %self.username, %err, "ignoring frame");
                    continue;
                },
            };

            match message_type {
                MessageType::Login => {
                    // Already logged in; a second handshake is an error.
                    self.send_error("You already logged in");
                },
                MessageType::Error | MessageType::Ack | MessageType::Nack => {
                    // Clients do not author errors, and the server never
                    // retransmits, so receipts from clients mean nothing.
                    debug!(user = %self.username, ty = ?message_type, "ignoring frame");
                },
                MessageType::Who => self.reply_who(),
                MessageType::Message => {
                    if !self.relay_message(&header) {
                        return;
                    }
                },
                MessageType::Disconnect => {
                    self.broadcast_notice(&format!(
                        "User: {} disconnected from the room.",
                        self.username
                    ));
                    info!(user = %self.username, "client disconnected");
                    return;
                },
            }
        }
    }

    /// WHO: ship the roster back to the requester.
    fn reply_who(&mut self) {
        let names = self.roster.list_names();
        let payload = names.into_bytes();
        let packet_number = self.counter.advance();
        let header = self
            .builder
            .reset()
            .packet_number(packet_number)
            .source_username(SERVER_NAME)
            .dest_username(&self.username)
            .message_type(MessageType::Who)
            .payload(&payload)
            .build();
        self.send_to_self(&Frame::new(header, payload).to_bytes());
    }

    /// MESSAGE: read the payload, verify its checksum, receipt, fan out.
    /// Returns `false` when the transport died and the session must end.
    fn relay_message(&mut self, header: &ParsedHeader) -> bool {
        let mut payload = vec![0u8; usize::from(header.data_packet_length())];
        if let Err(err) = self.reader.read_exact(&mut payload) {
            info!(user = %self.username, %err, "client socket closed mid-payload");
            return false;
        }

        if !header.verify_data_checksum(&payload) {
            warn!(user = %self.username, "corrupted message payload, sending NACK");
            self.send_receipt(MessageType::Nack, header.packet_number());
            return true;
        }
        self.send_receipt(MessageType::Ack, header.packet_number());

        // Relay byte-exact: the original header (its checksum included)
        // plus the verified payload, exactly as received.
        let wire = Frame::new(*header, payload).to_bytes();
        let dest = header.dest_username().into_owned();
        if dest == BROADCAST_NAME {
            self.roster.broadcast_except(&self.username, &wire);
        } else if !self.roster.send_to(&dest, &wire) {
            self.send_error(&format!("User: {dest} does not exist."));
        }
        true
    }

    /// Server-origin cleartext notice to everyone but this session.
    fn broadcast_notice(&mut self, text: &str) {
        let payload = text_payload(text);
        let packet_number = self.counter.advance();
        let header = self
            .builder
            .reset()
            .packet_number(packet_number)
            .source_username(SERVER_NAME)
            .dest_username(BROADCAST_NAME)
            .message_type(MessageType::Message)
            .payload(&payload)
            .build();
        self.roster.broadcast_except(&self.username, &Frame::new(header, payload).to_bytes());
    }

    /// ERROR frame back to this client.
    fn send_error(&mut self, reason: &str) {
        let payload = text_payload(reason);
        let packet_number = self.counter.advance();
        let header = self
            .builder
            .reset()
            .packet_number(packet_number)
            .source_username(SERVER_NAME)
            .dest_username(&self.username)
            .message_type(MessageType::Error)
            .payload(&payload)
            .build();
        self.send_to_self(&Frame::new(header, payload).to_bytes());
    }

    /// ACK or NACK echoing the client's own packet number.
    fn send_receipt(&mut self, ty: MessageType, echoed_packet_number: u16) {
        let header = self
            .builder
            .reset()
            .packet_number(echoed_packet_number)
            .dest_username(&self.username)
            .message_type(ty)
            .build();
        self.send_to_self(header.as_bytes());
    }

    /// Write to our own client. A failure here is logged only; the next
    /// read will observe the dead socket and end the session.
    fn send_to_self(&self, wire: &[u8]) {
        if let Err(err) = self.handle.send(wire) {
            warn!(user = %self.username, %err, "failed to write to own client");
        }
    }
}

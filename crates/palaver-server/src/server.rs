//! Listening socket, acceptor loop, and the login procedure.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use palaver_proto::{
    BROADCAST_NAME, Frame, HEADER_LEN, HeaderBuilder, MessageType, ParsedHeader, SERVER_NAME,
};
use tracing::{info, warn};

use crate::errors::ServerError;
use crate::roster::{Roster, SessionHandle};
use crate::session::{LOGIN_PACKET_NUMBER, Session, text_payload};

/// Default TCP port of the chat room.
pub const DEFAULT_PORT: u16 = 34551;

/// Error payload sent when a login is rejected.
const INVALID_USERNAME: &str = "Invalid username to login with.";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address of the listening socket.
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)) }
    }
}

/// The room server: one acceptor loop, one detached thread per client.
pub struct Server {
    listener: TcpListener,
    roster: Arc<Roster>,
}

impl Server {
    /// Bind the listening socket.
    pub fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind).map_err(ServerError::Bind)?;
        Ok(Self { listener, roster: Arc::new(Roster::new()) })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, handing each to its own login thread.
    /// Sessions are detached; nothing joins them on shutdown.
    pub fn run(self) -> Result<(), ServerError> {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let roster = Arc::clone(&self.roster);
                    let _ = thread::spawn(move || login_procedure(stream, &roster));
                },
                Err(err) => warn!(%err, "failed to accept connection"),
            }
        }
        Ok(())
    }
}

/// Drive one connection from accept to logout.
///
/// Exactly one header is read before the client is trusted with anything:
/// a short read, a bad checksum, a wrong version, or a non-LOGIN type all
/// close the socket without a reply, since nothing authentic has been
/// established yet. Admission conflicts do get an in-band error, because
/// by then the frame has proven integrity.
fn login_procedure(mut stream: TcpStream, roster: &Arc<Roster>) {
    let mut bytes = [0u8; HEADER_LEN];
    if let Err(err) = stream.read_exact(&mut bytes) {
        info!(%err, "connection closed before login");
        return;
    }

    let header = match ParsedHeader::parse(bytes) {
        Ok(header) => header,
        Err(err) => {
            warn!(%err, "rejecting connection with invalid login header");
            return;
        },
    };

    if header.message_type() != Ok(MessageType::Login) {
        warn!(ty = header.message_type_raw(), "first frame is not a login request");
        return;
    }

    let username = header.source_username().into_owned();
    if username.is_empty() || username == SERVER_NAME || username == BROADCAST_NAME {
        warn!(user = %username, "rejecting reserved or empty username");
        send_login_error(&mut stream, &username);
        return;
    }

    // Pre-build the login response while the builder is still ours; it
    // moves into the session on admission.
    let mut builder = HeaderBuilder::new();
    let login_response = builder
        .packet_number(LOGIN_PACKET_NUMBER)
        .message_type(MessageType::Login)
        .dest_username(&username)
        .build();

    let writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(err) => {
            warn!(user = %username, %err, "unable to clone client socket");
            return;
        },
    };
    let handle = Arc::new(SessionHandle::new(username.clone(), writer));

    if !roster.add_if_absent(Arc::clone(&handle)) {
        info!(user = %username, "duplicate login rejected");
        send_login_error(&mut stream, &username);
        return;
    }

    if handle.send(login_response.as_bytes()).is_err() {
        warn!(user = %username, "unable to send login response");
        roster.remove(&username);
        return;
    }

    Session::new(username.clone(), stream, handle, Arc::clone(roster), builder).run();

    roster.remove(&username);
    info!(user = %username, "session removed from roster");
}

/// In-band rejection for a login that carried a valid header but an
/// inadmissible username. The source field stays zeroed, like the login
/// echo's. The socket closes right after.
fn send_login_error(stream: &mut TcpStream, username: &str) {
    let payload = text_payload(INVALID_USERNAME);
    let header = HeaderBuilder::new()
        .packet_number(LOGIN_PACKET_NUMBER)
        .dest_username(username)
        .message_type(MessageType::Error)
        .payload(&payload)
        .build();
    if let Err(err) = stream.write_all(&Frame::new(header, payload).to_bytes()) {
        warn!(user = %username, %err, "unable to send login error");
    }
}

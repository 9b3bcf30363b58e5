//! End-to-end protocol scenarios against a real server on loopback.
//!
//! Each test drives raw sockets with hand-built frames, exactly as a
//! conforming client would: login echo, duplicate rejection, WHO,
//! NACK/resend, broadcast fan-out, and disconnect teardown.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use palaver_crypto::{KEY_LEN, RoomKey, decrypt, encrypt};
use palaver_proto::{
    BROADCAST_NAME, Frame, HEADER_LEN, HeaderBuilder, MessageType, ParsedHeader, SERVER_NAME,
};
use palaver_server::{Server, ServerConfig};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Start a server on an ephemeral loopback port; the acceptor thread is
/// detached and dies with the test process.
fn start_server() -> SocketAddr {
    let config = ServerConfig { bind: "127.0.0.1:0".parse().unwrap() };
    let server = Server::bind(&config).unwrap();
    let addr = server.local_addr().unwrap();
    let _ = thread::spawn(move || server.run());
    addr
}

/// A raw protocol client driving one socket.
struct TestClient {
    stream: TcpStream,
    username: String,
    packet_number: u16,
}

impl TestClient {
    fn connect(addr: SocketAddr, username: &str) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(READ_TIMEOUT)).unwrap();
        Self { stream, username: username.to_owned(), packet_number: 0 }
    }

    /// Connect and complete the login handshake, asserting the echo.
    fn login(addr: SocketAddr, username: &str) -> Self {
        let mut client = Self::try_login(addr, username).unwrap();
        let (header, payload) = client.read_frame();
        assert_eq!(header.message_type(), Ok(MessageType::Login));
        assert_eq!(header.packet_number(), 1);
        assert_eq!(header.dest_username(), username);
        assert_eq!(header.source_username(), "");
        assert_eq!(header.data_packet_length(), 0);
        assert!(payload.is_empty());
        client
    }

    /// Connect and send the login request; the response is left unread.
    fn try_login(addr: SocketAddr, username: &str) -> Option<Self> {
        let mut client = Self::connect(addr, username);
        let header = HeaderBuilder::new()
            .packet_number(client.packet_number)
            .source_username(username)
            .dest_username(SERVER_NAME)
            .message_type(MessageType::Login)
            .build();
        client.stream.write_all(header.as_bytes()).ok()?;
        client.packet_number = client.packet_number.wrapping_add(1);
        Some(client)
    }

    fn next_packet_number(&mut self) -> u16 {
        let number = self.packet_number;
        self.packet_number = self.packet_number.wrapping_add(1);
        number
    }

    fn send_who(&mut self) {
        let number = self.next_packet_number();
        let header = HeaderBuilder::new()
            .packet_number(number)
            .source_username(&self.username)
            .dest_username(SERVER_NAME)
            .message_type(MessageType::Who)
            .build();
        self.stream.write_all(header.as_bytes()).unwrap();
    }

    fn send_disconnect(&mut self) {
        let number = self.next_packet_number();
        let header = HeaderBuilder::new()
            .packet_number(number)
            .source_username(&self.username)
            .dest_username(SERVER_NAME)
            .message_type(MessageType::Disconnect)
            .build();
        self.stream.write_all(header.as_bytes()).unwrap();
    }

    /// Build a MESSAGE frame's wire bytes without sending them.
    fn build_message(&mut self, dest: &str, ciphertext: &[u8]) -> Vec<u8> {
        let number = self.next_packet_number();
        let header = HeaderBuilder::new()
            .packet_number(number)
            .source_username(&self.username)
            .dest_username(dest)
            .message_type(MessageType::Message)
            .payload(ciphertext)
            .build();
        Frame::new(header, ciphertext.to_vec()).to_bytes()
    }

    fn send_bytes(&mut self, wire: &[u8]) {
        self.stream.write_all(wire).unwrap();
    }

    fn read_frame_result(&mut self) -> std::io::Result<(ParsedHeader, Vec<u8>)> {
        let mut bytes = [0u8; HEADER_LEN];
        self.stream.read_exact(&mut bytes)?;
        let header = ParsedHeader::parse(bytes).unwrap();
        let mut payload = vec![0u8; usize::from(header.data_packet_length())];
        self.stream.read_exact(&mut payload)?;
        Ok((header, payload))
    }

    fn read_frame(&mut self) -> (ParsedHeader, Vec<u8>) {
        self.read_frame_result().unwrap()
    }

    /// Read frames until one of the wanted type arrives, skipping others
    /// (join/leave notices interleave freely with replies).
    fn read_until(&mut self, wanted: MessageType) -> (ParsedHeader, Vec<u8>) {
        loop {
            let (header, payload) = self.read_frame();
            if header.message_type() == Ok(wanted) {
                return (header, payload);
            }
        }
    }

    /// Assert that nothing arrives on this socket for a short while.
    fn expect_silence(&mut self) {
        self.stream.set_read_timeout(Some(Duration::from_millis(300))).unwrap();
        let mut byte = [0u8; 1];
        let outcome = self.stream.read(&mut byte);
        assert!(
            matches!(outcome, Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock
                || err.kind() == std::io::ErrorKind::TimedOut),
            "expected silence, got {outcome:?}"
        );
        self.stream.set_read_timeout(Some(READ_TIMEOUT)).unwrap();
    }
}

fn room_key() -> RoomKey {
    RoomKey::from_bytes([0x5A; KEY_LEN])
}

#[test]
fn login_echo() {
    let addr = start_server();
    let _alice = TestClient::login(addr, "alice");
}

#[test]
fn duplicate_login_is_rejected() {
    let addr = start_server();
    let mut alice = TestClient::login(addr, "alice");

    let mut imposter = TestClient::try_login(addr, "alice").unwrap();
    let (header, payload) = imposter.read_frame();
    assert_eq!(header.message_type(), Ok(MessageType::Error));
    assert_eq!(header.source_username(), "");
    assert_eq!(header.dest_username(), "alice");
    assert_eq!(payload, b"Invalid username to login with.\0");
    assert_eq!(payload.len(), 32);

    // The imposter's socket closes; the original session is unharmed.
    assert!(imposter.read_frame_result().is_err());
    alice.send_who();
    let (_, names) = alice.read_until(MessageType::Who);
    assert_eq!(roster_set(&names), HashSet::from(["alice".to_owned()]));
}

#[test]
fn reserved_usernames_are_rejected() {
    let addr = start_server();
    for name in [SERVER_NAME, BROADCAST_NAME] {
        let mut client = TestClient::try_login(addr, name).unwrap();
        let (header, payload) = client.read_frame();
        assert_eq!(header.message_type(), Ok(MessageType::Error));
        // Like the login echo, the rejection leaves the source zeroed.
        assert_eq!(header.source_username(), "");
        assert_eq!(payload, b"Invalid username to login with.\0");
    }
}

fn roster_set(payload: &[u8]) -> HashSet<String> {
    let text = std::str::from_utf8(payload).unwrap().trim_end_matches('\0');
    text.split(", ").map(str::to_owned).collect()
}

#[test]
fn who_lists_all_logged_in_users() {
    let addr = start_server();
    let mut alice = TestClient::login(addr, "alice");
    let _bob = TestClient::login(addr, "bob");

    alice.send_who();
    let (header, payload) = alice.read_until(MessageType::Who);
    assert_eq!(header.source_username(), SERVER_NAME);
    assert_eq!(header.dest_username(), "alice");
    assert!(header.verify_data_checksum(&payload));
    assert_eq!(roster_set(&payload), HashSet::from(["alice".to_owned(), "bob".to_owned()]));
}

#[test]
fn join_notice_reaches_earlier_users_only() {
    let addr = start_server();
    let mut alice = TestClient::login(addr, "alice");
    let mut bob = TestClient::login(addr, "bob");

    let (header, payload) = alice.read_until(MessageType::Message);
    assert_eq!(header.source_username(), SERVER_NAME);
    assert_eq!(header.dest_username(), BROADCAST_NAME);
    assert_eq!(payload, b"User: bob entered the room.\0");

    bob.expect_silence();
}

#[test]
fn corrupted_message_is_nacked_and_resend_is_forwarded() {
    let addr = start_server();
    let key = room_key();
    let mut alice = TestClient::login(addr, "alice");
    let mut bob = TestClient::login(addr, "bob");

    let ciphertext = encrypt(b"hi bob", &key).unwrap();
    let pristine = alice.build_message("bob", &ciphertext);
    let sent_packet_number = ParsedHeader::from_slice(&pristine).unwrap().packet_number();

    // Flip one payload byte so the data checksum disagrees.
    let mut corrupted = pristine.clone();
    corrupted[HEADER_LEN] ^= 0x01;
    alice.send_bytes(&corrupted);

    let (nack, _) = alice.read_until(MessageType::Nack);
    assert_eq!(nack.packet_number(), sent_packet_number);
    assert_eq!(nack.data_packet_length(), 0);

    // Retransmit the stored original, byte for byte.
    alice.send_bytes(&pristine);
    let (ack, _) = alice.read_until(MessageType::Ack);
    assert_eq!(ack.packet_number(), sent_packet_number);

    // Bob receives the forwarded frame byte-exact and can decrypt it.
    let (header, payload) = bob.read_until(MessageType::Message);
    assert_eq!(header.as_bytes().as_slice(), &pristine[..HEADER_LEN]);
    assert_eq!(payload, &pristine[HEADER_LEN..]);
    assert_eq!(decrypt(&payload, &key).unwrap(), b"hi bob");

    // The corrupted attempt was dropped, not forwarded.
    bob.expect_silence();
}

#[test]
fn unknown_recipient_earns_an_error() {
    let addr = start_server();
    let key = room_key();
    let mut alice = TestClient::login(addr, "alice");

    let ciphertext = encrypt(b"anyone there?", &key).unwrap();
    let wire = alice.build_message("ghost", &ciphertext);
    alice.send_bytes(&wire);

    let (_, _) = alice.read_until(MessageType::Ack);
    let (header, payload) = alice.read_until(MessageType::Error);
    assert_eq!(header.dest_username(), "alice");
    assert_eq!(payload, b"User: ghost does not exist.\0");
}

#[test]
fn broadcast_reaches_everyone_but_the_sender() {
    let addr = start_server();
    let key = room_key();
    let mut alice = TestClient::login(addr, "alice");
    let mut bob = TestClient::login(addr, "bob");
    let mut carol = TestClient::login(addr, "carol");

    let ciphertext = encrypt(b"hi room", &key).unwrap();
    let wire = alice.build_message(BROADCAST_NAME, &ciphertext);
    alice.send_bytes(&wire);

    let (ack, _) = alice.read_until(MessageType::Ack);
    assert_eq!(ack.packet_number(), ParsedHeader::from_slice(&wire).unwrap().packet_number());

    for receiver in [&mut bob, &mut carol] {
        let (header, payload) = receiver.read_until(MessageType::Message);
        // Skip join notices; the broadcast itself has a user source.
        let (header, payload) = if header.source_username() == SERVER_NAME {
            receiver.read_until(MessageType::Message)
        } else {
            (header, payload)
        };
        assert_eq!(header.source_username(), "alice");
        assert_eq!(header.dest_username(), BROADCAST_NAME);
        assert_eq!(payload, &wire[HEADER_LEN..]);
        assert_eq!(decrypt(&payload, &key).unwrap(), b"hi room");
    }

    // The sender never hears their own broadcast.
    alice.expect_silence();
}

#[test]
fn disconnect_notifies_the_room_and_frees_the_name() {
    let addr = start_server();
    let mut alice = TestClient::login(addr, "alice");
    let mut bob = TestClient::login(addr, "bob");

    // Drain bob's join notice on alice's socket first.
    let (_, payload) = alice.read_until(MessageType::Message);
    assert_eq!(payload, b"User: bob entered the room.\0");

    bob.send_disconnect();

    let (header, payload) = alice.read_until(MessageType::Message);
    assert_eq!(header.source_username(), SERVER_NAME);
    assert_eq!(header.dest_username(), BROADCAST_NAME);
    assert_eq!(payload, b"User: bob disconnected from the room.\0");

    // The server closes bob's socket.
    assert!(bob.read_frame_result().is_err());

    // The name frees up once the session is reaped; retry briefly.
    let mut readmitted = None;
    for _ in 0..50 {
        let mut candidate = TestClient::try_login(addr, "bob").unwrap();
        let (header, _) = candidate.read_frame();
        if header.message_type() == Ok(MessageType::Login) {
            readmitted = Some(candidate);
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }
    assert!(readmitted.is_some(), "username was never released");
}

#[test]
fn duplicate_login_frame_inside_a_session_is_an_error() {
    let addr = start_server();
    let mut alice = TestClient::login(addr, "alice");

    let header = HeaderBuilder::new()
        .packet_number(alice.next_packet_number())
        .source_username("alice")
        .dest_username(SERVER_NAME)
        .message_type(MessageType::Login)
        .build();
    alice.send_bytes(header.as_bytes());

    let (header, payload) = alice.read_until(MessageType::Error);
    assert_eq!(header.dest_username(), "alice");
    assert_eq!(payload, b"You already logged in\0");
}

#[test]
fn frame_with_bad_header_checksum_is_dropped() {
    let addr = start_server();
    let mut alice = TestClient::login(addr, "alice");

    // A WHO whose checksum was corrupted in flight: dropped, no reply.
    let header = HeaderBuilder::new()
        .packet_number(alice.next_packet_number())
        .source_username("alice")
        .dest_username(SERVER_NAME)
        .message_type(MessageType::Who)
        .build();
    let mut bytes = *header.as_bytes();
    bytes[0] ^= 0xFF;
    alice.send_bytes(&bytes);
    alice.expect_silence();

    // The session survives: a well-formed WHO still answers.
    alice.send_who();
    let (_, payload) = alice.read_until(MessageType::Who);
    assert_eq!(roster_set(&payload), HashSet::from(["alice".to_owned()]));
}

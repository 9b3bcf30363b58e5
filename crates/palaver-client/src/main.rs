//! Palaver client binary.
//!
//! Two threads over one socket: the main thread prompts for credentials,
//! then runs the command loop (send side); a second thread receives frames
//! and prints what they mean. The only shared mutable state is the
//! outbound tracker and the write half of the socket, each behind a mutex.
//!
//! # Usage
//!
//! ```bash
//! # Connect to a local server
//! palaver-client
//!
//! # Connect elsewhere, with the NACK exercise enabled
//! palaver-client --server 192.0.2.10:34551 --chaos
//! ```

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use clap::Parser;
use palaver_client::{ClientError, ClientEvent, Command, OutboundTracker, commands, handle_frame};
use palaver_crypto::{RoomKey, derive_key, encrypt};
use palaver_proto::{
    Frame, HEADER_LEN, HeaderBuilder, MAX_PAYLOAD_LEN, MAX_USERNAME_LEN, MessageType,
    PacketCounter, ParsedHeader, SERVER_NAME,
};
use rand::Rng;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Palaver chat room client
#[derive(Parser, Debug)]
#[command(name = "palaver-client")]
#[command(about = "Interactive client for the palaver chat room")]
#[command(version)]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:34551")]
    server: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Corrupt roughly one in six outbound messages to exercise the
    /// NACK/resend path
    #[arg(long)]
    chaos: bool,
}

/// One in this many chaos-mode messages is corrupted before send.
const CHAOS_DENOMINATOR: u32 = 6;

type SharedWriter = Arc<Mutex<TcpStream>>;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let username = clamp_username(prompt(&format!(
        "What will your username be ({MAX_USERNAME_LEN} max): "
    ))?);
    let password = prompt("Enter the password for the room: ")?;

    println!("Deriving the room key...");
    let key = derive_key(password.as_bytes())?;

    let stream = TcpStream::connect(args.server)?;
    let writer: SharedWriter = Arc::new(Mutex::new(stream.try_clone()?));
    let tracker = Arc::new(OutboundTracker::new());
    let running = Arc::new(AtomicBool::new(true));

    let mut counter = PacketCounter::starting_at(0);
    let mut builder = HeaderBuilder::new();

    // Login rides packet 0; the receiver thread prints the echo.
    let login = builder
        .packet_number(counter.current())
        .source_username(&username)
        .dest_username(SERVER_NAME)
        .message_type(MessageType::Login)
        .build();
    send(&writer, login.as_bytes())?;

    let receiver = {
        let reader = stream.try_clone()?;
        let writer = Arc::clone(&writer);
        let tracker = Arc::clone(&tracker);
        let key = key.clone();
        let running = Arc::clone(&running);
        thread::spawn(move || receive_loop(reader, &writer, &tracker, &key, &running))
    };

    console_help();

    loop {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        let closed = io::stdin().read_line(&mut line)? == 0;

        // The receiver may have noticed a dead socket while we blocked.
        if !running.load(Ordering::SeqCst) {
            break;
        }
        if closed {
            send_disconnect(&writer, &mut builder, &mut counter, &username)?;
            break;
        }

        match commands::parse(&line) {
            Ok(Command::Help) => console_help(),
            Ok(Command::Who) => {
                let header = builder
                    .reset()
                    .packet_number(counter.advance())
                    .source_username(&username)
                    .dest_username(SERVER_NAME)
                    .message_type(MessageType::Who)
                    .build();
                send(&writer, header.as_bytes())?;
            },
            Ok(Command::Exit) => {
                send_disconnect(&writer, &mut builder, &mut counter, &username)?;
                break;
            },
            Ok(Command::Message { recipient, body }) => send_message(
                &writer,
                &tracker,
                &mut builder,
                &mut counter,
                &key,
                &username,
                &recipient,
                &body,
                args.chaos,
            )?,
            Err(err) => println!("{err}"),
        }
    }

    // Wake the receiver out of its blocking read and collect it.
    running.store(false, Ordering::SeqCst);
    let _ = stream.shutdown(Shutdown::Both);
    let _ = receiver.join();
    Ok(())
}

/// Receive frames until the socket dies, the server disconnects us, or a
/// protocol desync makes continuing unsafe.
fn receive_loop(
    mut reader: TcpStream,
    writer: &SharedWriter,
    tracker: &OutboundTracker,
    key: &RoomKey,
    running: &AtomicBool,
) {
    loop {
        let mut bytes = [0u8; HEADER_LEN];
        if reader.read_exact(&mut bytes).is_err() {
            // Quiet when the send side initiated the shutdown.
            if running.swap(false, Ordering::SeqCst) {
                println!("Disconnected from server");
            }
            return;
        }

        let header = match ParsedHeader::parse(bytes) {
            Ok(header) => header,
            Err(err) => {
                warn!(%err, "dropping frame from server");
                continue;
            },
        };

        let mut payload = vec![0u8; usize::from(header.data_packet_length())];
        if reader.read_exact(&mut payload).is_err() {
            if running.swap(false, Ordering::SeqCst) {
                println!("Disconnected from server");
            }
            return;
        }

        let outcome = {
            let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
            handle_frame(&header, &payload, tracker, key, &mut *writer)
        };

        match outcome {
            Ok(Some(event)) => {
                if render(&event) {
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            },
            Ok(None) => {},
            Err(err) => {
                println!("Error - {err}");
                running.store(false, Ordering::SeqCst);
                return;
            },
        }
    }
}

/// Print one event. Returns whether the session is over.
fn render(event: &ClientEvent) -> bool {
    match event {
        ClientEvent::LoggedIn => println!("You have logged in."),
        ClientEvent::ServerError(reason) => println!("Error - {reason}"),
        ClientEvent::Roster(list) => println!("Users - {list}"),
        ClientEvent::Chat { from, broadcast: true, text } => {
            println!("(Room) {from} says > {text}");
        },
        ClientEvent::Chat { from, broadcast: false, text } => {
            println!("{from} whispers to you > {text}");
        },
        ClientEvent::Undecryptable { from } => {
            println!("Message from {from} not able to decrypt.");
        },
        ClientEvent::DuplicateAck { packet_number } => {
            warn!(packet_number, "server acknowledged an already-acknowledged packet");
        },
        ClientEvent::Retransmitted { packet_number } => {
            info!(packet_number, "retransmitted after NACK");
        },
        ClientEvent::Disconnected => {
            println!("Server has disconnected you.");
            return true;
        },
    }
    false
}

/// Encrypt and send one chat message, recording it for retransmission
/// first. With `--chaos`, the transmitted copy (never the recorded one)
/// occasionally gets a flipped payload byte.
#[allow(clippy::too_many_arguments)]
fn send_message(
    writer: &SharedWriter,
    tracker: &OutboundTracker,
    builder: &mut HeaderBuilder,
    counter: &mut PacketCounter,
    key: &RoomKey,
    username: &str,
    recipient: &str,
    body: &str,
    chaos: bool,
) -> Result<(), ClientError> {
    let ciphertext = encrypt(body.as_bytes(), key)?;
    if ciphertext.len() > MAX_PAYLOAD_LEN {
        println!("That message is too long to send.");
        return Ok(());
    }

    let packet_number = counter.advance();
    let header = builder
        .reset()
        .packet_number(packet_number)
        .source_username(username)
        .dest_username(recipient)
        .message_type(MessageType::Message)
        .payload(&ciphertext)
        .build();
    let mut wire = Frame::new(header, ciphertext).to_bytes();

    tracker.record(packet_number, wire.clone())?;

    if chaos && rand::thread_rng().gen_range(0..CHAOS_DENOMINATOR) == 0 {
        wire[HEADER_LEN] ^= 0x20;
        println!("Corrupted one byte of that message to exercise the NACK path.");
    }

    send(writer, &wire)
}

fn send_disconnect(
    writer: &SharedWriter,
    builder: &mut HeaderBuilder,
    counter: &mut PacketCounter,
    username: &str,
) -> Result<(), ClientError> {
    let header = builder
        .reset()
        .packet_number(counter.advance())
        .source_username(username)
        .dest_username(SERVER_NAME)
        .message_type(MessageType::Disconnect)
        .build();
    send(writer, header.as_bytes())
}

/// One full frame per `write_all` under the shared mutex, so the command
/// loop and a NACK retransmission can never interleave bytes.
fn send(writer: &SharedWriter, bytes: &[u8]) -> Result<(), ClientError> {
    let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
    writer.write_all(bytes)?;
    Ok(())
}

fn prompt(label: &str) -> io::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_owned())
}

/// Clamp the username to the wire field's 31 usable bytes, on a char
/// boundary, so the name we display locally matches the name on the wire.
fn clamp_username(mut name: String) -> String {
    if name.len() > MAX_USERNAME_LEN {
        let mut end = MAX_USERNAME_LEN;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
        println!("Username shortened to '{name}' to fit the protocol limit.");
    }
    name
}

fn console_help() {
    println!("Help");
    println!("====");
    println!("help                          - this message");
    println!("message <username> <message>  - send a message to username");
    println!("message all <message>         - send a message to the room");
    println!("who                           - find out who is in the room");
    println!("exit                          - leave the room (and the program)");
}

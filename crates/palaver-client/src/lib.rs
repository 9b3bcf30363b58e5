//! Client-side protocol logic for the palaver chat system.
//!
//! Everything testable lives here: the outbound tracker backing the
//! NACK/resend path, the translation of received frames into
//! [`ClientEvent`]s, and the command parser. The binary in `main.rs` wires
//! these to stdin, stdout, and the socket.

pub mod commands;
pub mod errors;
pub mod event;
pub mod tracker;

pub use commands::{Command, CommandError};
pub use errors::ClientError;
pub use event::{ClientEvent, handle_frame};
pub use tracker::OutboundTracker;

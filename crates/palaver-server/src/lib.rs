//! The palaver chat room server.
//!
//! One listening socket, one OS thread per connected client, blocking I/O
//! throughout; there is no async runtime. The only cross-thread mutable
//! state is the [`Roster`], a readers-writer-locked map from username to
//! the shared write half of that user's socket. Sessions read their own
//! socket exclusively; everyone else reaches a session only through
//! roster-mediated sends, which serialise on a per-session output mutex so
//! concurrent fan-outs can never interleave frame bytes.
//!
//! The server never decrypts chat payloads. MESSAGE frames are relayed
//! byte-exact, original header checksum included; only server-origin text
//! (join/leave notices, WHO replies, errors) is produced here, in clear.

pub mod errors;
pub mod roster;
pub mod server;
pub mod session;

pub use errors::ServerError;
pub use roster::{Roster, SessionHandle};
pub use server::{DEFAULT_PORT, Server, ServerConfig};
pub use session::Session;

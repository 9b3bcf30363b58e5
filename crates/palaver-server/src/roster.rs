//! Process-wide roster: username → session write handle.
//!
//! The roster is the single piece of cross-thread mutable state on the
//! server. Admission and removal take the write lock; every fan-out takes
//! the read lock, so a fan-out observes a consistent membership snapshot
//! for its whole duration. `send` is the only blocking operation performed
//! under the lock.
//!
//! Entries hold their [`SessionHandle`] by `Arc`, so a handle looked up
//! under the read lock stays valid for the send even if the owning session
//! thread is tearing down concurrently.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::{self, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::warn;

/// Shared write half of one logged-in client's socket.
///
/// All writes go through [`SessionHandle::send`], which holds the output
/// mutex across the whole frame so two concurrent senders cannot
/// interleave header and payload bytes on the wire.
#[derive(Debug)]
pub struct SessionHandle {
    username: String,
    writer: Mutex<TcpStream>,
}

impl SessionHandle {
    /// Wrap the write half of a client socket.
    pub fn new(username: impl Into<String>, writer: TcpStream) -> Self {
        Self { username: username.into(), writer: Mutex::new(writer) }
    }

    /// The username this handle was admitted under.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Write one complete frame to this client.
    pub fn send(&self, frame: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(frame)
    }
}

/// Username → session mapping behind a readers-writer lock.
#[derive(Debug, Default)]
pub struct Roster {
    clients: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl Roster {
    /// An empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a session under its username, unless the name is taken.
    ///
    /// Atomic under the write lock: of any number of concurrent admissions
    /// for one name, exactly one succeeds.
    pub fn add_if_absent(&self, handle: Arc<SessionHandle>) -> bool {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        match clients.entry(handle.username().to_owned()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            },
        }
    }

    /// Remove a session. Returns whether an entry existed.
    pub fn remove(&self, username: &str) -> bool {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        clients.remove(username).is_some()
    }

    /// Send one frame to `dest`. Returns `false` when the user is unknown
    /// or the write fails; a failed write is logged and never aborts the
    /// sending session.
    pub fn send_to(&self, dest: &str, frame: &[u8]) -> bool {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        let Some(handle) = clients.get(dest) else {
            return false;
        };
        match handle.send(frame) {
            Ok(()) => true,
            Err(err) => {
                warn!(user = %dest, %err, "failed to deliver frame");
                false
            },
        }
    }

    /// Send one frame to every session except `sender`. Returns whether
    /// every delivery succeeded.
    pub fn broadcast_except(&self, sender: &str, frame: &[u8]) -> bool {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        let mut all_delivered = true;
        for (username, handle) in clients.iter() {
            if username == sender {
                continue;
            }
            if let Err(err) = handle.send(frame) {
                warn!(user = %username, %err, "failed to deliver broadcast frame");
                all_delivered = false;
            }
        }
        all_delivered
    }

    /// Logged-in usernames joined with ", " (unspecified order),
    /// NUL-terminated, ready to ship as a WHO payload.
    pub fn list_names(&self) -> String {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        let mut names = clients.keys().map(String::as_str).collect::<Vec<_>>().join(", ");
        names.push('\0');
        names
    }

    /// Number of logged-in sessions.
    pub fn len(&self) -> usize {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no one is logged in.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `username` currently holds a session.
    pub fn contains(&self, username: &str) -> bool {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).contains_key(username)
    }
}

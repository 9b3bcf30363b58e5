//! Server error types.

use std::io;

use thiserror::Error;

/// Errors that end the server process (per-session failures are handled
/// in-session and never surface here).
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be created.
    #[error("unable to bind listening socket: {0}")]
    Bind(#[source] io::Error),

    /// Transport failure outside any one session.
    #[error(transparent)]
    Io(#[from] io::Error),
}

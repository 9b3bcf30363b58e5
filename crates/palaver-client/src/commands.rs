//! Parsing of interactive console commands.

use thiserror::Error;

/// One parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the command summary.
    Help,
    /// Ask the server who is in the room.
    Who,
    /// Leave the room and quit.
    Exit,
    /// Send a message to one user, or to "all" for the whole room.
    Message {
        /// Destination username (or "all").
        recipient: String,
        /// Message text, encrypted before it leaves the process.
        body: String,
    },
}

/// Why an input line did not parse.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Not a recognised command word.
    #[error("that is not a valid command; type 'help' for options")]
    Unknown,
    /// `message` without a recipient.
    #[error("specify a recipient; type 'help' for options")]
    MissingRecipient,
    /// `message <recipient>` without any text.
    #[error("specify a message to send; type 'help' for options")]
    MissingBody,
}

/// Parse one input line.
///
/// `message` takes everything after the recipient verbatim (inner spaces
/// included); the other commands take no arguments.
pub fn parse(input: &str) -> Result<Command, CommandError> {
    let input = input.trim();
    let mut parts = input.splitn(3, ' ');

    match parts.next() {
        Some("help") if parts.next().is_none() => Ok(Command::Help),
        Some("who") if parts.next().is_none() => Ok(Command::Who),
        Some("exit") if parts.next().is_none() => Ok(Command::Exit),
        Some("message") => {
            let recipient = match parts.next() {
                Some(recipient) if !recipient.is_empty() => recipient,
                _ => return Err(CommandError::MissingRecipient),
            };
            let body = match parts.next() {
                Some(body) if !body.trim().is_empty() => body,
                _ => return Err(CommandError::MissingBody),
            };
            Ok(Command::Message { recipient: recipient.to_owned(), body: body.to_owned() })
        },
        _ => Err(CommandError::Unknown),
    }
}

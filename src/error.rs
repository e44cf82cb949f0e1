//! Our error types for the HCS PSUs.

use thiserror::Error;

use crate::transaction::{LINE_CAPACITY, Line, Lines};

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for Manson HCS PSU communications.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error")]
    SerialError(I),
    #[error("Protocol error: {0}")]
    Protocol(ProtocolError),
    #[error("Unsupported model ({model}) or version ({version})")]
    UnsupportedDevice { model: Line, version: Line },
    #[error("Invalid range")]
    InvalidRange,
    #[error("Buffer capacity exceeded")]
    BufferError,
}

/// Every way a reply can break the line grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A line arrived without its carriage return.
    #[error("Incomplete response line following {after:?}: {partial:02x?}")]
    IncompleteLine {
        after: Lines,
        partial: heapless::Vec<u8, LINE_CAPACITY>,
    },
    /// Wrong number of lines, or the last line is not `OK`.
    #[error("Bad response: {0:?}")]
    BadResponse(Lines),
    /// Payload did not match the expected digit groups or token table.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(Line),
    /// A set command was answered with data.
    #[error("Unexpected data in response: {0}")]
    UnexpectedData(Line),
    /// A get command was answered with a bare `OK`.
    #[error("Missing data in response")]
    MissingData,
    #[error("Non-ASCII byte in response: {0:#04x}")]
    InvalidCharacter(u8),
}

/// Errors raised while building a command, before anything touches the wire.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Value does not fit in its field")]
    InvalidRange,
    #[error("Command too long")]
    BufferError,
}

impl<I: embedded_io::Error> From<ProtocolError> for Error<I> {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

impl<I: embedded_io::Error> From<EncodeError> for Error<I> {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::InvalidRange => Error::InvalidRange,
            EncodeError::BufferError => Error::BufferError,
        }
    }
}

//! Command framing and the request/reply transaction.
//!
//! A transaction is one command line out, followed by an optional data line and a mandatory `OK` line back.
//! There is no length prefix or checksum, so the end of a reply is detected by the line going quiet:
//! we wait generously for the first line, then only briefly for anything that follows.

use core::fmt::Write as _;

use embedded_io::Error as _;
use fugit::MillisDurationU32;
use log::trace;
use strum_macros::{AsRefStr, EnumIter};

use crate::{
    error::{EncodeError, Error, ProtocolError, Result},
    transport::Transport,
};

/// Terminates every line, in both directions.
pub const TERMINATOR: u8 = b'\r';

/// The final line of every successful reply.
pub const AFFIRMATIVE: &str = "OK";

/// Inter-byte timeout while waiting for the PSU to start answering.
pub const FIRST_RESPONSE_TIMEOUT: MillisDurationU32 = MillisDurationU32::millis(100);

/// Inter-byte timeout once the PSU is answering. It sends the rest of a reply back to back.
pub const BURST_TIMEOUT: MillisDurationU32 = MillisDurationU32::millis(2);

pub const LINE_CAPACITY: usize = 32;
pub const MAX_LINES: usize = 4;
pub const COMMAND_CAPACITY: usize = 48;

/// One reply line, terminator stripped.
pub type Line = heapless::String<LINE_CAPACITY>;
pub type Lines = heapless::Vec<Line, MAX_LINES>;

/// Every command the HCS firmware understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Verb {
    /// Model name.
    Gmod,
    /// Firmware revision.
    Gver,
    /// Error/protection status.
    Gerr,
    /// Maximum voltage and current.
    Gmax,
    /// Target voltage and current.
    Gets,
    /// Display (measured) voltage, current and CV/CC mode.
    Getd,
    /// Set target voltage.
    Volt,
    /// Set target current.
    Curr,
    /// Set target voltage, current and output suppression in one go.
    Sevc,
    /// Read the three preset memories. Slow.
    Getm,
    /// Program the three preset memories. Slow.
    Prom,
    /// Recall a preset memory.
    Runm,
    /// Enter remote session.
    Sess,
    /// End remote session.
    Ends,
    /// Output suppression flag.
    Gout,
    Sout,
    /// Over-voltage protection level.
    Govp,
    Sovp,
    /// Over-current protection level.
    Gocp,
    Socp,
}

/// A verb plus its positional arguments, concatenated without separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: heapless::String<COMMAND_CAPACITY>,
}

impl Command {
    pub fn new(verb: Verb) -> Self {
        let mut text = heapless::String::new();
        // Verbs are four characters, the buffer always has room.
        let _ = text.push_str(verb.as_ref());
        Self { text }
    }

    /// Append `value` as a zero-padded decimal field exactly `width` digits wide.
    pub fn with_field(mut self, value: u32, width: usize) -> core::result::Result<Self, EncodeError> {
        if digit_count(value) > width {
            return Err(EncodeError::InvalidRange);
        }
        write!(self.text, "{value:0width$}").map_err(|_| EncodeError::BufferError)?;
        Ok(self)
    }

    /// Append a literal token, e.g. a flag digit.
    pub fn with_token(mut self, token: &str) -> core::result::Result<Self, EncodeError> {
        self.text
            .push_str(token)
            .map_err(|_| EncodeError::BufferError)?;
        Ok(self)
    }

    /// The command line without its terminator.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

fn digit_count(mut value: u32) -> usize {
    let mut digits = 1;
    while value >= 10 {
        value /= 10;
        digits += 1;
    }
    digits
}

/// What a well formed reply carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A data line followed by `OK`.
    Data(Line),
    /// `OK` alone.
    Ack,
}

/// Send `command` and collect the reply.
pub fn execute<T: Transport>(transport: &mut T, command: &Command) -> Result<Reply, T::Error> {
    trace!("Write command: {}", command.as_str());
    transport
        .write_all(command.as_str().as_bytes())
        .map_err(Error::SerialError)?;
    transport
        .write_all(&[TERMINATOR])
        .map_err(Error::SerialError)?;
    transport.flush().map_err(Error::SerialError)?;

    let mut lines = Lines::new();
    let mut overflowed = false;
    let mut buf = [0u8; LINE_CAPACITY];

    transport
        .set_inter_byte_timeout(FIRST_RESPONSE_TIMEOUT)
        .map_err(Error::SerialError)?;
    let mut count = read_line(transport, &mut buf)?;
    transport
        .set_inter_byte_timeout(BURST_TIMEOUT)
        .map_err(Error::SerialError)?;

    while count != 0 {
        let raw = &buf[..count];
        trace!("Read line: {raw:02x?}");
        let Some((&last, body)) = raw.split_last() else {
            break;
        };
        if last != TERMINATOR {
            if count == buf.len() {
                return Err(Error::BufferError);
            }
            let mut partial = heapless::Vec::new();
            // `raw` is never longer than the line buffer.
            let _ = partial.extend_from_slice(raw);
            return Err(ProtocolError::IncompleteLine {
                after: lines,
                partial,
            }
            .into());
        }
        if lines.push(decode_line(body)?).is_err() {
            overflowed = true;
        }
        count = read_line(transport, &mut buf)?;
    }

    let terminated = lines.last().is_some_and(|line| line.as_str() == AFFIRMATIVE);
    if overflowed || !(1..=2).contains(&lines.len()) || !terminated {
        return Err(ProtocolError::BadResponse(lines).into());
    }

    if lines.len() == 1 {
        Ok(Reply::Ack)
    } else {
        Ok(Reply::Data(lines.swap_remove(0)))
    }
}

/// For set commands: any data in the reply is an error.
pub fn execute_no_data<T: Transport>(transport: &mut T, command: &Command) -> Result<(), T::Error> {
    match execute(transport, command)? {
        Reply::Ack => Ok(()),
        Reply::Data(line) => Err(ProtocolError::UnexpectedData(line).into()),
    }
}

/// For get commands: the reply must carry a data line.
pub fn execute_data<T: Transport>(transport: &mut T, command: &Command) -> Result<Line, T::Error> {
    match execute(transport, command)? {
        Reply::Data(line) => Ok(line),
        Reply::Ack => Err(ProtocolError::MissingData.into()),
    }
}

fn read_line<T: Transport>(transport: &mut T, buf: &mut [u8]) -> Result<usize, T::Error> {
    transport.read_until(TERMINATOR, buf).map_err(|e| {
        trace!("Read failed: {:?}", e.kind());
        Error::SerialError(e)
    })
}

fn decode_line(body: &[u8]) -> core::result::Result<Line, ProtocolError> {
    if let Some(&byte) = body.iter().find(|byte| !byte.is_ascii()) {
        return Err(ProtocolError::InvalidCharacter(byte));
    }
    let text = core::str::from_utf8(body).map_err(|_| ProtocolError::InvalidCharacter(0))?;
    let mut line = Line::new();
    // `body` is shorter than the line buffer it was read into.
    let _ = line.push_str(text.trim_end());
    Ok(line)
}

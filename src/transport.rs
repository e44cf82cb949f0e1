//! The byte channel a [`HcsPsu`](crate::psu::HcsPsu) talks through.
//!
//! Any [embedded_io::Read] + [embedded_io::Write] type can act as a transport, as long as it also lets us
//! tune its two read timeouts at runtime. The HCS protocol has no length prefix, so the only way to tell a
//! reply has finished is to notice that the line has gone quiet.

use embedded_io::{Error, ErrorKind};
use fugit::MillisDurationU32;

/// Serial link speed. Data bits: 8, stop bits: 1, parity: none.
pub const BAUD_RATE: u32 = 9600;

/// Default time to wait for the first byte of a read.
pub const DEFAULT_TIMEOUT: MillisDurationU32 = MillisDurationU32::millis(100);

/// Default time to wait between two bytes of the same read.
pub const DEFAULT_INTER_BYTE_TIMEOUT: MillisDurationU32 = MillisDurationU32::millis(2);

/// A half-duplex channel to the PSU.
///
/// Reads are expected to give up once the relevant timeout elapses, either by returning `Ok(0)` or an error
/// of kind [`ErrorKind::TimedOut`]. Both are treated as "nothing more to read".
pub trait Transport: embedded_io::Read + embedded_io::Write {
    /// How long a read waits for its first byte.
    fn timeout(&self) -> MillisDurationU32;

    fn set_timeout(&mut self, timeout: MillisDurationU32) -> Result<(), Self::Error>;

    /// How long a read waits for each further byte once data has started arriving.
    fn inter_byte_timeout(&self) -> MillisDurationU32;

    fn set_inter_byte_timeout(&mut self, timeout: MillisDurationU32) -> Result<(), Self::Error>;

    /// Drop anything sitting in the input or output buffers.
    fn clear(&mut self) -> Result<(), Self::Error>;

    /// Read bytes into `buf` up to and including `terminator`.
    ///
    /// Stops early when a timeout elapses or `buf` is full, so the returned slice may lack the terminator.
    /// Returns `0` when nothing arrived at all.
    fn read_until(&mut self, terminator: u8, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..=filled]) {
                Ok(0) => break,
                Ok(_) => {
                    filled += 1;
                    if buf[filled - 1] == terminator {
                        break;
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

//! [`Transport`] over a host serial port, using the `serialport` crate.

use std::time::Duration;

use fugit::MillisDurationU32;
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use thiserror::Error;

use crate::{
    error::{Error, Result},
    psu::HcsPsu,
    transport::{BAUD_RATE, DEFAULT_INTER_BYTE_TIMEOUT, DEFAULT_TIMEOUT, Transport},
};

#[derive(Error, Debug)]
pub enum SerialTransportError {
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl embedded_io::Error for SerialTransportError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            SerialTransportError::Port(e) => match e.kind() {
                serialport::ErrorKind::NoDevice => embedded_io::ErrorKind::NotFound,
                serialport::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
                serialport::ErrorKind::Io(kind) => io_kind(kind),
                serialport::ErrorKind::Unknown => embedded_io::ErrorKind::Other,
            },
            SerialTransportError::Io(e) => io_kind(e.kind()),
        }
    }
}

fn io_kind(kind: std::io::ErrorKind) -> embedded_io::ErrorKind {
    match kind {
        std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
        std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
        std::io::ErrorKind::NotConnected => embedded_io::ErrorKind::NotConnected,
        std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
        std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
        std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
        std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
        std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
        std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
        std::io::ErrorKind::OutOfMemory => embedded_io::ErrorKind::OutOfMemory,
        _ => embedded_io::ErrorKind::Other,
    }
}

/// An open serial port plus the two read timeouts the HCS protocol needs.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    timeout: MillisDurationU32,
    inter_byte_timeout: MillisDurationU32,
}

impl SerialTransport {
    /// Open `port_name` at 9600 baud, 8N1.
    pub fn open(port_name: &str) -> core::result::Result<Self, SerialTransportError> {
        let port = serialport::new(port_name, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(to_std(DEFAULT_TIMEOUT))
            .open()?;
        Ok(Self::from_port(port))
    }

    /// Wrap a port that has already been opened and configured.
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            timeout: DEFAULT_TIMEOUT,
            inter_byte_timeout: DEFAULT_INTER_BYTE_TIMEOUT,
        }
    }
}

fn to_std(duration: MillisDurationU32) -> Duration {
    Duration::from_millis(duration.to_millis().into())
}

impl embedded_io::ErrorType for SerialTransport {
    type Error = SerialTransportError;
}

impl embedded_io::Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, Self::Error> {
        std::io::Read::read(&mut self.port, buf).map_err(SerialTransportError::Io)
    }
}

impl embedded_io::Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> core::result::Result<usize, Self::Error> {
        std::io::Write::write(&mut self.port, buf).map_err(SerialTransportError::Io)
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        std::io::Write::flush(&mut self.port).map_err(SerialTransportError::Io)
    }
}

impl Transport for SerialTransport {
    fn timeout(&self) -> MillisDurationU32 {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: MillisDurationU32) -> core::result::Result<(), Self::Error> {
        self.port.set_timeout(to_std(timeout))?;
        self.timeout = timeout;
        Ok(())
    }

    fn inter_byte_timeout(&self) -> MillisDurationU32 {
        self.inter_byte_timeout
    }

    fn set_inter_byte_timeout(&mut self, timeout: MillisDurationU32) -> core::result::Result<(), Self::Error> {
        self.inter_byte_timeout = timeout;
        Ok(())
    }

    fn clear(&mut self) -> core::result::Result<(), Self::Error> {
        self.port.clear(ClearBuffer::All)?;
        Ok(())
    }

    /// The first byte may take up to the base timeout to arrive, every following byte only the inter-byte
    /// timeout. The port is left at the base timeout afterwards, whatever the outcome.
    fn read_until(&mut self, terminator: u8, buf: &mut [u8]) -> core::result::Result<usize, Self::Error> {
        let result = self.read_bytes(terminator, buf);
        let restored = self.port.set_timeout(to_std(self.timeout));
        let filled = result?;
        restored?;
        Ok(filled)
    }
}

impl SerialTransport {
    fn read_bytes(
        &mut self,
        terminator: u8,
        buf: &mut [u8],
    ) -> core::result::Result<usize, SerialTransportError> {
        let mut filled = 0;
        while filled < buf.len() {
            let wait = if filled == 0 {
                self.timeout
            } else {
                self.inter_byte_timeout
            };
            self.port.set_timeout(to_std(wait))?;

            match std::io::Read::read(&mut self.port, &mut buf[filled..=filled]) {
                Ok(0) => break,
                Ok(_) => {
                    filled += 1;
                    if buf[filled - 1] == terminator {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => return Err(SerialTransportError::Io(e)),
            }
        }
        Ok(filled)
    }
}

impl HcsPsu<SerialTransport> {
    /// Open the serial port called `port_name` and connect to the PSU on it.
    pub fn open(port_name: &str) -> Result<Self, SerialTransportError> {
        let transport = SerialTransport::open(port_name).map_err(Error::SerialError)?;
        Self::connect(transport)
    }
}

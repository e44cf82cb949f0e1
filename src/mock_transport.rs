//! We use this mocking module in unit tests to emulate the PSU end of a serial link.

use fugit::MillisDurationU32;

use crate::transport::{DEFAULT_INTER_BYTE_TIMEOUT, DEFAULT_TIMEOUT, Transport};

const REPLY_CAPACITY: usize = 64;

/// Which of the two transport timeouts was changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Base,
    InterByte,
}

/// Our mock type used to emulate a PSU answering over serial.
///
/// Replies are queued up front. Each time a complete command (ending in `\r`) is written, the next queued
/// reply becomes readable. Once it has been read out, reads time out.
pub struct MockTransport {
    /// Everything written to the mock.
    write_buffer: heapless::Vec<u8, 512>,
    /// Replies waiting for a command.
    replies: heapless::Deque<heapless::Vec<u8, REPLY_CAPACITY>, 16>,
    /// The reply currently being read.
    pending: heapless::Vec<u8, REPLY_CAPACITY>,
    read_position: usize,
    timeout: MillisDurationU32,
    inter_byte_timeout: MillisDurationU32,
    /// Every timeout change, in order.
    timeout_log: heapless::Vec<(TimeoutKind, u32), 128>,
    clear_count: usize,
    should_error_on_write: bool,
    should_error_on_read: bool,
    should_error_on_timeout: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum MockTransportError {
    /// Nothing left to read.
    #[error("Timed out")]
    Timeout,
    #[error("Buffer overflow")]
    BufferOverflow,
    /// Generic simulated error for testing.
    #[error("Simulated error")]
    SimulatedError,
}

impl embedded_io::Error for MockTransportError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockTransportError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockTransportError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockTransportError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockTransport {
    type Error = MockTransportError;
}

impl embedded_io::Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockTransportError::SimulatedError);
        }

        for &byte in buf {
            self.write_buffer
                .push(byte)
                .map_err(|_| MockTransportError::BufferOverflow)?;
            if byte == b'\r' {
                self.pending = self.replies.pop_front().unwrap_or_default();
                self.read_position = 0;
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockTransportError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockTransportError::SimulatedError);
        }

        if self.read_position >= self.pending.len() {
            return Err(MockTransportError::Timeout);
        }

        let available = &self.pending[self.read_position..];
        let count = core::cmp::min(buf.len(), available.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.read_position += count;
        Ok(count)
    }
}

impl Transport for MockTransport {
    fn timeout(&self) -> MillisDurationU32 {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: MillisDurationU32) -> Result<(), Self::Error> {
        if self.should_error_on_timeout {
            return Err(MockTransportError::SimulatedError);
        }
        self.timeout = timeout;
        self.log_timeout(TimeoutKind::Base, timeout)
    }

    fn inter_byte_timeout(&self) -> MillisDurationU32 {
        self.inter_byte_timeout
    }

    fn set_inter_byte_timeout(&mut self, timeout: MillisDurationU32) -> Result<(), Self::Error> {
        if self.should_error_on_timeout {
            return Err(MockTransportError::SimulatedError);
        }
        self.inter_byte_timeout = timeout;
        self.log_timeout(TimeoutKind::InterByte, timeout)
    }

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.pending.clear();
        self.read_position = 0;
        self.clear_count += 1;
        Ok(())
    }
}

impl MockTransport {
    /// Create a new MockTransport with nothing queued.
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            replies: heapless::Deque::new(),
            pending: heapless::Vec::new(),
            read_position: 0,
            timeout: DEFAULT_TIMEOUT,
            inter_byte_timeout: DEFAULT_INTER_BYTE_TIMEOUT,
            timeout_log: heapless::Vec::new(),
            clear_count: 0,
            should_error_on_write: false,
            should_error_on_read: false,
            should_error_on_timeout: false,
        }
    }

    /// Queue the raw bytes the "PSU" sends back after the next command.
    pub fn queue_reply(&mut self, reply: &[u8]) {
        let mut bytes = heapless::Vec::new();
        bytes
            .extend_from_slice(reply)
            .expect("reply too long for mock");
        self.replies
            .push_back(bytes)
            .expect("too many replies queued on mock");
    }

    /// A mock that has already answered the connect handshake for a supported PSU.
    pub fn with_identity(model: &str, version: &str) -> Self {
        let mut mock = Self::new();
        let mut reply: heapless::Vec<u8, REPLY_CAPACITY> = heapless::Vec::new();
        reply.extend_from_slice(model.as_bytes()).unwrap();
        reply.extend_from_slice(b"\rOK\r").unwrap();
        mock.queue_reply(&reply);
        reply.clear();
        reply.extend_from_slice(version.as_bytes()).unwrap();
        reply.extend_from_slice(b"\rOK\r").unwrap();
        mock.queue_reply(&reply);
        mock
    }

    /// Get a reference to the data that was written to this mock.
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Clear the write buffer.
    pub fn clear_written_data(&mut self) {
        self.write_buffer.clear();
    }

    /// Number of replies still waiting for a command.
    pub fn queued_replies(&self) -> usize {
        self.replies.len()
    }

    pub fn timeout_log(&self) -> &[(TimeoutKind, u32)] {
        &self.timeout_log
    }

    pub fn clear_count(&self) -> usize {
        self.clear_count
    }

    /// Configure whether write operations should fail with an error.
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error.
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }

    /// Configure whether changing a timeout should fail with an error.
    pub fn set_timeout_error(&mut self, should_error: bool) {
        self.should_error_on_timeout = should_error;
    }

    fn log_timeout(
        &mut self,
        kind: TimeoutKind,
        timeout: MillisDurationU32,
    ) -> Result<(), MockTransportError> {
        self.timeout_log
            .push((kind, timeout.to_millis()))
            .map_err(|_| MockTransportError::BufferOverflow)
    }
}

/// Route `log` output through the test harness.
pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::max())
        .is_test(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, Write};

    #[test]
    fn test_new_mock_transport() {
        let mock = MockTransport::new();
        assert!(mock.written_data().is_empty());
        assert_eq!(mock.queued_replies(), 0);
        assert_eq!(mock.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(mock.inter_byte_timeout(), DEFAULT_INTER_BYTE_TIMEOUT);
    }

    #[test]
    fn test_reply_released_by_terminated_command() {
        let mut mock = MockTransport::new();
        mock.queue_reply(b"OK\r");

        let mut buffer = [0u8; 8];
        // Nothing readable before a command has been sent.
        assert!(matches!(
            mock.read(&mut buffer),
            Err(MockTransportError::Timeout)
        ));

        mock.write_all(b"SESS").unwrap();
        assert!(mock.read(&mut buffer).is_err());

        mock.write_all(b"\r").unwrap();
        let count = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..count], b"OK\r");
        assert_eq!(mock.written_data(), b"SESS\r");
    }

    #[test]
    fn test_replies_are_consumed_in_order() {
        let mut mock = MockTransport::new();
        mock.queue_reply(b"first\r");
        mock.queue_reply(b"second\r");

        let mut buffer = [0u8; 16];
        mock.write_all(b"A\r").unwrap();
        let count = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..count], b"first\r");

        mock.write_all(b"B\r").unwrap();
        let count = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..count], b"second\r");
        assert_eq!(mock.queued_replies(), 0);
    }

    #[test]
    fn test_unanswered_reply_is_dropped_by_next_command() {
        let mut mock = MockTransport::new();
        mock.queue_reply(b"stale\r");

        mock.write_all(b"A\r").unwrap();
        mock.write_all(b"B\r").unwrap();

        let mut buffer = [0u8; 16];
        assert!(mock.read(&mut buffer).is_err());
    }

    #[test]
    fn test_timeout_changes_are_logged() {
        let mut mock = MockTransport::new();
        mock.set_timeout(MillisDurationU32::millis(500)).unwrap();
        mock.set_inter_byte_timeout(MillisDurationU32::millis(7))
            .unwrap();

        assert_eq!(
            mock.timeout_log(),
            &[(TimeoutKind::Base, 500), (TimeoutKind::InterByte, 7)]
        );
        assert_eq!(mock.timeout().to_millis(), 500);
    }

    #[test]
    fn test_error_simulation() {
        let mut mock = MockTransport::new();
        mock.set_write_error(true);
        assert!(mock.write(b"test").is_err());
        assert!(mock.flush().is_err());
        assert!(mock.written_data().is_empty());

        mock.set_write_error(false);
        mock.queue_reply(b"OK\r");
        mock.write_all(b"X\r").unwrap();
        mock.set_read_error(true);
        let mut buffer = [0u8; 4];
        assert!(matches!(
            mock.read(&mut buffer),
            Err(MockTransportError::SimulatedError)
        ));

        mock.set_timeout_error(true);
        assert!(mock.set_timeout(DEFAULT_TIMEOUT).is_err());
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            MockTransportError::Timeout.kind(),
            embedded_io::ErrorKind::TimedOut
        ));
        assert!(matches!(
            MockTransportError::BufferOverflow.kind(),
            embedded_io::ErrorKind::OutOfMemory
        ));
        assert!(matches!(
            MockTransportError::SimulatedError.kind(),
            embedded_io::ErrorKind::Other
        ));
    }

    #[test]
    fn test_clear_drops_pending_reply() {
        let mut mock = MockTransport::new();
        mock.queue_reply(b"garbage\r");
        mock.write_all(b"X\r").unwrap();
        mock.clear().unwrap();

        let mut buffer = [0u8; 8];
        assert!(mock.read(&mut buffer).is_err());
        assert_eq!(mock.clear_count(), 1);
    }
}

//! Line-oriented session transport over a [`Port`].

use crate::error::Result;
use crate::port::Port;
use crate::protocol::SAMPLE_REQUEST;
use log::trace;
use std::io::ErrorKind;

#[cfg(feature = "native")]
use crate::port::{NativePort, SerialConfig};

/// Line-oriented connection to the board.
///
/// Owns the port exclusively. Bytes after a newline are kept for the next
/// [`Session::read_line`] call.
pub struct Session<P: Port> {
    port: P,
    pending: Vec<u8>,
}

impl<P: Port> Session<P> {
    /// Wrap an already opened port.
    pub fn new(port: P) -> Self {
        Self {
            port,
            pending: Vec::new(),
        }
    }

    /// Port name/path.
    pub fn name(&self) -> &str {
        self.port
            .name()
    }

    /// Write a single command byte.
    pub fn send_command(&mut self, command: u8) -> Result<()> {
        trace!("-> {:?}", char::from(command));
        self.port
            .write_all_bytes(&[command])
    }

    /// Ask the board for one sample line.
    pub fn request_sample(&mut self) -> Result<()> {
        self.send_command(SAMPLE_REQUEST)
    }

    /// Read one line, blocking up to the port timeout.
    ///
    /// Returns the decoded line with surrounding whitespace trimmed. On
    /// timeout returns whatever partial text arrived, which is usually the
    /// empty string.
    pub fn read_line(&mut self) -> Result<String> {
        let mut buf = [0u8; 256];

        loop {
            if let Some(pos) = self
                .pending
                .iter()
                .position(|&b| b == b'\n')
            {
                let line: Vec<u8> = self
                    .pending
                    .drain(..=pos)
                    .collect();
                return Ok(decode_line(&line));
            }

            match self
                .port
                .read(&mut buf)
            {
                // A zero-length read means nothing arrived within the timeout.
                Ok(0) => return Ok(self.take_partial()),
                Ok(n) => self
                    .pending
                    .extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::TimedOut => return Ok(self.take_partial()),
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Close the port. The session cannot be used afterwards.
    pub fn close(mut self) -> Result<()> {
        self.port
            .close()
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    fn take_partial(&mut self) -> String {
        let line = decode_line(&self.pending);
        self.pending
            .clear();
        if !line.is_empty() {
            trace!("Partial line on timeout: {line:?}");
        }
        line
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let line = String::from_utf8_lossy(bytes)
        .trim()
        .to_string();
    trace!("<- {line:?}");
    line
}

/// Open the board's serial port and wait for its boot-time reset to settle.
#[cfg(feature = "native")]
pub fn open_native(config: &SerialConfig) -> Result<Session<NativePort>> {
    let port = NativePort::open(config)?;
    std::thread::sleep(config.settle);
    log::info!("Connected to {}", config.port_name);
    Ok(Session::new(port))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::{Read, Write};

    /// In-memory port: each queued chunk is returned by one `read`, an
    /// exhausted queue reads as a timeout.
    pub(crate) struct ScriptedPort {
        pub(crate) chunks: VecDeque<Vec<u8>>,
        pub(crate) written: Vec<u8>,
        pub(crate) closed: bool,
    }

    impl ScriptedPort {
        pub(crate) fn new<I, S>(chunks: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: AsRef<[u8]>,
        {
            Self {
                chunks: chunks
                    .into_iter()
                    .map(|c| c.as_ref().to_vec())
                    .collect(),
                written: Vec::new(),
                closed: false,
            }
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.chunks.pop_front() {
                Some(chunk) if chunk.is_empty() => {
                    Err(std::io::Error::new(ErrorKind::TimedOut, "timed out"))
                },
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.chunks.push_front(chunk[n..].to_vec());
                    }
                    Ok(n)
                },
                None => Err(std::io::Error::new(ErrorKind::TimedOut, "timed out")),
            }
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Port for ScriptedPort {
        fn name(&self) -> &str {
            "scripted"
        }

        fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    #[test]
    fn test_request_sample_writes_single_byte() {
        let mut session = Session::new(ScriptedPort::new(Vec::<Vec<u8>>::new()));
        session.request_sample().unwrap();
        assert_eq!(session.port().written, b"a");
    }

    #[test]
    fn test_read_line_trims_line_endings() {
        let mut session = Session::new(ScriptedPort::new(["  hello world\r\n"]));
        assert_eq!(session.read_line().unwrap(), "hello world");
    }

    #[test]
    fn test_read_line_joins_split_chunks() {
        let mut session = Session::new(ScriptedPort::new(["Raw ADC: 1", "2 | rest\n"]));
        assert_eq!(session.read_line().unwrap(), "Raw ADC: 12 | rest");
    }

    #[test]
    fn test_read_line_keeps_remainder_for_next_call() {
        let mut session = Session::new(ScriptedPort::new(["first\nsecond\n"]));
        assert_eq!(session.read_line().unwrap(), "first");
        assert_eq!(session.read_line().unwrap(), "second");
    }

    #[test]
    fn test_read_line_timeout_returns_empty() {
        let mut session = Session::new(ScriptedPort::new(Vec::<Vec<u8>>::new()));
        assert_eq!(session.read_line().unwrap(), "");
    }

    #[test]
    fn test_read_line_timeout_returns_partial() {
        let mut session = Session::new(ScriptedPort::new(["no newline", ""]));
        assert_eq!(session.read_line().unwrap(), "no newline");
        assert_eq!(session.read_line().unwrap(), "");
    }

    #[test]
    fn test_read_line_invalid_utf8_is_lossy() {
        let mut session = Session::new(ScriptedPort::new([&b"ok\xFF\n"[..]]));
        assert_eq!(session.read_line().unwrap(), "ok\u{FFFD}");
    }

    #[test]
    fn test_close_releases_port() {
        let session = Session::new(ScriptedPort::new(Vec::<Vec<u8>>::new()));
        session.close().unwrap();
    }
}

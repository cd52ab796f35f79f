//! Port abstraction for the serial link to the board.
//!
//! The session transport and the collectors only need a byte stream with a
//! read timeout, so they are written against the [`Port`] trait. The native
//! implementation wraps the `serialport` crate; tests substitute scripted
//! in-memory ports.
//!
//! ```text
//! +------------------+
//! |   Collectors     |
//! +--------+---------+
//!          |
//! +--------+---------+
//! | Session (lines)  |
//! +--------+---------+
//!          |
//! +--------+---------+
//! |   Port Trait     |
//! +--------+---------+
//!          |
//! +--------+---------+
//! | Native SerialPort|
//! |   (serialport)   |
//! +------------------+
//! ```

#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Baud rate the board's firmware prints at.
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Read timeout for a single line.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause after opening the port; the board resets when the port opens.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(2);

/// Serial port configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read timeout.
    pub timeout: Duration,
    /// Delay after open before any traffic is sent.
    pub settle: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            settle: DEFAULT_SETTLE,
        }
    }
}

impl SerialConfig {
    /// Create a configuration for the given port with default link settings.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Default::default()
        }
    }

    /// Set the baud rate.
    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the settle delay.
    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

/// Byte stream to the board.
///
/// Reads must honour the configured timeout and report it as
/// [`std::io::ErrorKind::TimedOut`].
pub trait Port: Read + Write + Send {
    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Close the port and release the device.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }
}

#[cfg(feature = "native")]
pub use native::NativePort;

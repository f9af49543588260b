use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use crate::error::{Result, SerialError};

const BLOCKING_READ_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// A connected byte stream to a sensor. Implements `Read + Write`.
///
/// This is the fundamental I/O type handed to the framing layer.
/// Usually it wraps a UART opened with [`crate::open`]; on Unix it can also
/// wrap a stream socket (simulators, socket pairs in tests).
pub struct SerialStream {
    inner: SerialStreamInner,
}

enum SerialStreamInner {
    Port(Box<dyn SerialPort>),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Port(port) => port.read(buf),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Port(port) => port.write(buf),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            SerialStreamInner::Port(port) => port.flush(),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl SerialStream {
    /// Wrap an already opened serial port.
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self {
            inner: SerialStreamInner::Port(port),
        }
    }

    /// Wrap a Unix stream socket.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: SerialStreamInner::Unix(stream),
        }
    }

    /// Set the read timeout on the underlying stream.
    ///
    /// A serial port needs a finite timeout; `None` is mapped to one hour.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            SerialStreamInner::Port(port) => port
                .set_timeout(timeout.unwrap_or(BLOCKING_READ_TIMEOUT))
                .map_err(SerialError::Configure),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// Used to split one device into an independent reader and writer.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            SerialStreamInner::Port(port) => {
                let cloned = port.try_clone().map_err(SerialError::Configure)?;
                Ok(Self::from_port(cloned))
            }
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => {
                let cloned = stream.try_clone()?;
                Ok(Self::from_unix(cloned))
            }
        }
    }

    /// Device name for diagnostics.
    pub fn name(&self) -> String {
        match &self.inner {
            SerialStreamInner::Port(port) => port.name().unwrap_or_else(|| "serial".to_string()),
            #[cfg(unix)]
            SerialStreamInner::Unix(_) => "unix-stream".to_string(),
        }
    }
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            SerialStreamInner::Port(port) => f
                .debug_struct("SerialStream")
                .field("type", &"serial")
                .field("name", &port.name())
                .finish(),
            #[cfg(unix)]
            SerialStreamInner::Unix(_) => f.debug_struct("SerialStream").field("type", &"unix").finish(),
        }
    }
}

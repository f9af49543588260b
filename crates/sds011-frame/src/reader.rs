use std::io::{ErrorKind, Read};

use sds011_serial::SerialStream;

use crate::clock::uptime_millis;
use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};
use crate::framer::{Received, StreamFramer};

/// Reads frames from any `Read` stream.
///
/// Each [`poll`](Self::poll) performs at most one read, so callers are never
/// blocked for longer than the stream's read timeout. Partial frames stay
/// buffered across polls.
pub struct FrameReader<T> {
    inner: T,
    framer: StreamFramer,
    chunk: Vec<u8>,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            framer: StreamFramer::new(),
            chunk: vec![0u8; config.read_chunk_size.max(1)],
            config,
        }
    }

    /// Try to produce the next frame.
    ///
    /// Returns `Ok(None)` when no complete frame is available yet, including
    /// when the read timed out. Returns `Err(FrameError::ConnectionClosed)`
    /// at end of stream.
    pub fn poll(&mut self) -> Result<Option<Received>> {
        if let Some(received) = self.framer.push(&[], uptime_millis()) {
            return Ok(Some(received));
        }

        let read = match self.inner.read(&mut self.chunk) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => n,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
                ) =>
            {
                return Ok(None)
            }
            Err(err) => return Err(FrameError::Io(err)),
        };

        Ok(self.framer.push(&self.chunk[..read], uptime_millis()))
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<SerialStream> {
    /// Create a frame reader for a `SerialStream` and apply the read timeout
    /// from config.
    pub fn with_config_serial(mut inner: SerialStream, config: FrameConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

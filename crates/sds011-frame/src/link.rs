use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use sds011_serial::{SerialConfig, SerialStream};
use tracing::debug;

use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::framer::Received;
use crate::reader::FrameReader;
use crate::writer::FrameWriter;

/// A channel to one or more sensors that moves whole frames.
///
/// Methods take `&self` so that a receive loop and a controller can share
/// one transport. `receive` never blocks indefinitely: it returns `Ok(None)`
/// when nothing arrived within the transport's read window. Once `close` has
/// been called, every subsequent call fails with
/// [`FrameError::ConnectionClosed`].
pub trait Transport: Send + Sync {
    fn send(&self, frame: &Frame) -> Result<()>;

    fn receive(&self) -> Result<Option<Received>>;

    fn close(&self) -> Result<()>;
}

/// [`Transport`] over a reader/writer pair, typically two handles to the same
/// serial port.
pub struct FramedLink<R, W> {
    reader: Mutex<FrameReader<R>>,
    writer: Mutex<FrameWriter<W>>,
    closed: AtomicBool,
}

impl<R: Read, W: Write> FramedLink<R, W> {
    pub fn new(reader: FrameReader<R>, writer: FrameWriter<W>) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(FrameError::ConnectionClosed);
        }
        Ok(())
    }
}

impl FramedLink<SerialStream, SerialStream> {
    /// Open a serial device and split it into read and write handles.
    pub fn open(path: impl AsRef<Path>, serial: &SerialConfig) -> Result<Self> {
        let stream = sds011_serial::open(path, serial)?;
        Self::from_stream(
            stream,
            FrameConfig {
                read_timeout: Some(serial.read_timeout),
                ..FrameConfig::default()
            },
        )
    }

    /// Wrap an already open stream.
    pub fn from_stream(stream: SerialStream, config: FrameConfig) -> Result<Self> {
        let write_half = stream.try_clone()?;
        let reader = FrameReader::with_config_serial(stream, config)?;
        Ok(Self::new(reader, FrameWriter::new(write_half)))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<R, W> Transport for FramedLink<R, W>
where
    R: Read + Send,
    W: Write + Send,
{
    fn send(&self, frame: &Frame) -> Result<()> {
        self.ensure_open()?;
        lock(&self.writer).send(frame)
    }

    fn receive(&self) -> Result<Option<Received>> {
        self.ensure_open()?;
        lock(&self.reader).poll()
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("link closed");
        }
        Ok(())
    }
}

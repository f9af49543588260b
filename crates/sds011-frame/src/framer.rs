use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::codec::{decode_frame, enough_bytes, trim_to_last_start, Frame};
use crate::error::DecodeError;

const INITIAL_BUFFER_CAPACITY: usize = 64;

/// Outcome of one framing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A well-formed frame.
    Frame(Frame),
    /// Bytes that looked like a frame but failed to decode. Non-fatal.
    Discarded(DecodeError),
}

/// Turns an unreliable byte stream into frames.
///
/// Every push appends the new bytes, throws away everything before the last
/// start byte and, once enough bytes are buffered, attempts one decode. After
/// each attempt exactly one leading byte is dropped, success or not, so the
/// buffer always shrinks and a truncated frame can never stall the stream.
#[derive(Debug, Default)]
pub struct StreamFramer {
    buf: BytesMut,
}

impl StreamFramer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Feed newly read bytes. `bytes` may be empty to retry on what is
    /// already buffered.
    pub fn push(&mut self, bytes: &[u8], timestamp: u64) -> Option<Received> {
        self.buf.extend_from_slice(bytes);
        self.trim();

        if !enough_bytes(&self.buf) {
            trace!(buffered = self.buf.len(), "waiting for more bytes");
            return None;
        }

        let result = decode_frame(timestamp, &self.buf);
        self.buf.advance(1);

        Some(match result {
            Ok(frame) => {
                debug!(%frame, "frame received");
                Received::Frame(frame)
            }
            Err(err) => {
                debug!(error = %err, "discarding bytes");
                Received::Discarded(err)
            }
        })
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    fn trim(&mut self) {
        let keep = trim_to_last_start(&self.buf).len();
        self.buf.advance(self.buf.len() - keep);
    }
}

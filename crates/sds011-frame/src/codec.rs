use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, FrameError, Result};
use crate::kind::{
    CommandKind, DeviceId, FunctionNumber, FROM_DEVICE_LEN, START_BYTE, STOP_BYTE, TO_DEVICE_LEN,
};

/// A validated SDS011 frame.
///
/// Frames are immutable once built. They come either from a constructor in
/// [`crate::command`] or from a successful [`decode_frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: CommandKind,
    device_id: DeviceId,
    payload: Bytes,
    timestamp: u64,
}

impl Frame {
    /// Create a frame from its logical parts.
    ///
    /// The payload must be exactly 13 bytes for `ToDevice` and 4 bytes for
    /// the two device-to-host kinds, and its function byte must be one the
    /// kind allows, so that every frame built here decodes again. The
    /// timestamp starts at zero.
    pub fn new(kind: CommandKind, device_id: DeviceId, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() != kind.payload_len() {
            return Err(FrameError::PayloadLength {
                kind,
                expected: kind.payload_len(),
                len: payload.len(),
            });
        }
        check_function(kind, &payload)?;
        Ok(Self::from_parts(kind, device_id, payload))
    }

    pub(crate) fn from_parts(kind: CommandKind, device_id: DeviceId, payload: Bytes) -> Self {
        Self {
            kind,
            device_id,
            payload,
            timestamp: 0,
        }
    }

    /// Same frame with a different receive timestamp.
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Milliseconds since process start at which the frame was decoded.
    /// Zero for locally constructed frames.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Function number from payload byte 0. `None` for telemetry frames,
    /// which carry no function number.
    pub fn function(&self) -> Option<FunctionNumber> {
        match self.kind {
            CommandKind::FromDeviceTelemetry => None,
            _ => self.payload.first().copied().and_then(FunctionNumber::from_byte),
        }
    }

    /// Checksum this frame carries on the wire.
    pub fn checksum(&self) -> u8 {
        checksum(self.device_id, &self.payload)
    }

    /// Total encoded length.
    pub fn wire_len(&self) -> usize {
        self.kind.frame_len()
    }

    /// Returns true if the frame is addressed to or sent from `id`,
    /// honoring the 0xFFFF wildcard on either side.
    pub fn matches_id(&self, id: DeviceId) -> bool {
        self.device_id.matches(id)
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.wire_len());
        encode_frame(self, &mut dst);
        dst.freeze()
    }
}

/// Frame checksum: low byte of `id_low + id_high + sum(payload)`.
pub fn checksum(device_id: DeviceId, payload: &[u8]) -> u8 {
    payload
        .iter()
        .fold(device_id.low().wrapping_add(device_id.high()), |acc, b| {
            acc.wrapping_add(*b)
        })
}

/// Encode a frame into the wire format. The checksum is always recomputed.
///
/// Wire format:
/// ```text
/// ┌──────┬──────┬───────────────┬─────────┬────────┬──────────┬──────┐
/// │ 0xAA │ kind │ payload       │ id high │ id low │ checksum │ 0xAB │
/// │      │      │ (13 or 4 B)   │         │        │          │      │
/// └──────┴──────┴───────────────┴─────────┴────────┴──────────┴──────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) {
    dst.reserve(frame.wire_len());
    dst.put_u8(START_BYTE);
    dst.put_u8(frame.kind.as_byte());
    dst.put_slice(&frame.payload);
    dst.put_u16(frame.device_id.0);
    dst.put_u8(frame.checksum());
    dst.put_u8(STOP_BYTE);
}

/// Slice starting at the last start byte in `src`, or empty if there is none.
///
/// Resynchronization always picks the *last* 0xAA. A payload or checksum byte
/// equal to 0xAA therefore hides the real start of its frame, and a second
/// frame in the same buffer hides the first one.
pub fn trim_to_last_start(src: &[u8]) -> &[u8] {
    match src.iter().rposition(|b| *b == START_BYTE) {
        Some(pos) => &src[pos..],
        None => &[],
    }
}

/// Returns true once `src` holds enough bytes to attempt a decode.
pub fn enough_bytes(src: &[u8]) -> bool {
    let n = src.len();
    if n < FROM_DEVICE_LEN {
        return false;
    }
    n >= TO_DEVICE_LEN || src[FROM_DEVICE_LEN - 1] == STOP_BYTE
}

/// Decode one frame from `src`, stamping it with `timestamp`.
///
/// Leading noise up to the last start byte is ignored. A 10-byte frame is
/// preferred over a 19-byte one whenever byte 9 is the stop byte.
pub fn decode_frame(timestamp: u64, src: &[u8]) -> std::result::Result<Frame, DecodeError> {
    let mut arr = trim_to_last_start(src);

    if arr.len() < FROM_DEVICE_LEN {
        return Err(DecodeError::TooShort { len: arr.len() });
    }
    if arr[FROM_DEVICE_LEN - 1] == STOP_BYTE {
        arr = &arr[..FROM_DEVICE_LEN];
    } else if arr.len() >= TO_DEVICE_LEN && arr[TO_DEVICE_LEN - 1] == STOP_BYTE {
        arr = &arr[..TO_DEVICE_LEN];
    }

    let n = arr.len();
    if n != FROM_DEVICE_LEN && n != TO_DEVICE_LEN {
        return Err(DecodeError::LengthMismatch { len: n });
    }
    if arr[0] != START_BYTE {
        return Err(DecodeError::BadHeader(arr[0]));
    }
    if arr[n - 1] != STOP_BYTE {
        return Err(DecodeError::BadTrailer(arr[n - 1]));
    }
    let kind = CommandKind::from_byte(arr[1]).ok_or(DecodeError::UnsupportedCommand(arr[1]))?;

    let device_id = DeviceId::from_bytes(arr[n - 4], arr[n - 3]);
    let found = arr[n - 2];
    let payload = &arr[2..n - 4];

    if n != kind.frame_len() {
        return Err(DecodeError::UnexpectedLength {
            kind,
            expected: kind.frame_len(),
            len: n,
        });
    }
    check_function(kind, payload)?;

    let computed = checksum(device_id, payload);
    if computed != found {
        return Err(DecodeError::ChecksumMismatch { computed, found });
    }

    Ok(Frame {
        kind,
        device_id,
        payload: Bytes::copy_from_slice(payload),
        timestamp,
    })
}

/// Commands must carry a known function; acknowledgements any function but
/// the data query. Telemetry has no function byte.
fn check_function(kind: CommandKind, payload: &[u8]) -> std::result::Result<(), DecodeError> {
    let supported = match kind {
        CommandKind::ToDevice => FunctionNumber::from_byte(payload[0]).is_some(),
        CommandKind::FromDeviceAck => FunctionNumber::from_byte(payload[0])
            .map(FunctionNumber::is_acknowledged)
            .unwrap_or(false),
        CommandKind::FromDeviceTelemetry => true,
    };
    if !supported {
        return Err(DecodeError::UnsupportedFunction {
            kind,
            function: payload[0],
        });
    }
    Ok(())
}

/// Default size of a single read from the byte stream.
pub const DEFAULT_READ_CHUNK: usize = 1024;

/// Configuration for frame I/O.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest number of bytes taken from the stream per read. Default: 1024.
    pub read_chunk_size: usize,
    /// Read timeout applied to the stream. A receive never blocks longer than
    /// this. Default: 100 ms.
    pub read_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK,
            read_timeout: Some(std::time::Duration::from_millis(100)),
        }
    }
}

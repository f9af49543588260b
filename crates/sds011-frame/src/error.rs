use crate::kind::{CommandKind, FunctionNumber};

/// Reasons a byte sequence is not a well-formed frame.
///
/// All of these are recoverable: the framer discards the offending bytes and
/// keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Fewer than 10 bytes left after resynchronizing on the start byte.
    #[error("frame too short ({len} bytes, at least 10 required)")]
    TooShort { len: usize },

    /// The candidate is neither a 10-byte nor a 19-byte frame.
    #[error("invalid frame length {len} (expected 10 or 19)")]
    LengthMismatch { len: usize },

    /// Byte 0 is not the start byte.
    #[error("invalid frame header 0x{0:02X}")]
    BadHeader(u8),

    /// The last byte is not the stop byte.
    #[error("invalid frame termination 0x{0:02X}")]
    BadTrailer(u8),

    /// Byte 1 is not a known command kind.
    #[error("command kind 0x{0:02X} is not supported")]
    UnsupportedCommand(u8),

    /// The frame length does not match what its command kind requires.
    #[error("expected {expected}-byte frame for {kind}, got {len}")]
    UnexpectedLength {
        kind: CommandKind,
        expected: usize,
        len: usize,
    },

    /// Payload byte 0 is not a function valid for this command kind.
    #[error("function {function} not supported with {kind}")]
    UnsupportedFunction { kind: CommandKind, function: u8 },

    /// The checksum byte does not match the recomputed checksum.
    #[error("checksum mismatch (computed 0x{computed:02X}, frame has 0x{found:02X})")]
    ChecksumMismatch { computed: u8, found: u8 },
}

/// Errors from frame construction, field access and frame I/O.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Malformed bytes.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A field accessor was used on a frame carrying a different function.
    #[error("function number is not {expected}, it is {found}")]
    FunctionMismatch { expected: FunctionNumber, found: u8 },

    /// A field accessor was used on a frame of the wrong kind.
    #[error("{accessor} is not available on {kind} frames")]
    KindMismatch {
        accessor: &'static str,
        kind: CommandKind,
    },

    /// Payload length does not fit the command kind.
    #[error("payload of {len} bytes does not fit {kind} (expected {expected})")]
    PayloadLength {
        kind: CommandKind,
        expected: usize,
        len: usize,
    },

    /// Serial link setup failed.
    #[error("serial error: {0}")]
    Serial(#[from] sds011_serial::SerialError),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link was closed.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

use std::path::PathBuf;
use std::time::Duration;

use sds011_frame::DecodeError;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Frame-level or link error.
    #[error("frame error: {0}")]
    Frame(#[from] sds011_frame::FrameError),

    /// No acknowledgement arrived in time.
    #[error("no response from sensor within {0:?}")]
    Timeout(Duration),

    /// The sensor's power line is switched off.
    #[error("power line not enabled")]
    PowerDisabled,

    /// Settings writes are refused in passive mode.
    #[error("write not allowed in passive mode")]
    WriteNotAllowed,

    /// Period above the 30 minute maximum.
    #[error("invalid period {0} (0-30 minutes allowed)")]
    InvalidPeriod(u8),

    /// The sensor acknowledged a write with a different value.
    #[error("setting {setting} to {value} failed, sensor reported {reported}")]
    VerifyFailed {
        setting: &'static str,
        value: String,
        reported: String,
    },

    /// A host command arrived on the receive side.
    #[error("received host command {0}, RX and TX may be shorted")]
    Misdirected(String),

    /// A frame arrived while the power line is switched off.
    #[error("received {0} while power line is off, power switch may have failed")]
    PowerSwitch(String),

    /// Bytes discarded by the framer.
    #[error("discarded bytes: {0}")]
    Discarded(DecodeError),

    /// `run` was called while another receive loop is active.
    #[error("receive loop already running")]
    AlreadyRunning,

    /// The session has been closed.
    #[error("session closed")]
    Closed,

    /// Counter file could not be read or written.
    #[error("counter file {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Counter file does not hold a decimal number.
    #[error("counter file {path} holds {content:?}, expected a decimal number")]
    InvalidCounter { path: PathBuf, content: String },
}

pub type Result<T> = std::result::Result<T, SessionError>;

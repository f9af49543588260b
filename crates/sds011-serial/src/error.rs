use std::path::PathBuf;

/// Errors that can occur on the serial byte link.
#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    /// Failed to open the serial device.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: serialport::Error,
    },

    /// Failed to enumerate serial devices.
    #[error("failed to list serial ports: {0}")]
    Enumerate(serialport::Error),

    /// Failed to change a port setting after open.
    #[error("failed to configure serial port: {0}")]
    Configure(serialport::Error),

    /// An I/O error occurred on the byte stream.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;

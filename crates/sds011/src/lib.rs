//! Host-side driver for SDS011 particulate matter sensors.
//!
//! The sensor talks a fixed-size framed protocol over a 9600 baud UART. This
//! crate re-exports the layers that implement it.
//!
//! # Crate Structure
//!
//! - [`serial`]: the physical byte link (serial ports, Unix streams for testing)
//! - [`frame`]: frame codec, stream framing and the frame [`Transport`](frame::Transport)
//! - [`session`]: request/acknowledge correlation, settings and telemetry

/// Re-export serial link types.
pub mod serial {
    pub use sds011_serial::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sds011_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use sds011_session::*;
}

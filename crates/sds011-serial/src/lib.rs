//! Serial byte link for the SDS011 particulate-matter sensor.
//!
//! This is the lowest layer of the stack. It opens the sensor's UART at the
//! fixed 9600-8N1 line settings and hands back a [`SerialStream`] that
//! implements `Read + Write`. Everything above (framing, sessions) works on
//! plain byte streams, so a Unix stream can stand in for the port when
//! talking to a simulator over a socket pair or pty bridge.

pub mod error;
pub mod port;
pub mod stream;

pub use error::{Result, SerialError};
pub use port::{available_ports, open, PortInfo, SerialConfig, DEFAULT_BAUD_RATE};
pub use stream::SerialStream;

//! SDS011 wire protocol: frame codec and stream framing.
//!
//! Every frame is delimited by a start byte (0xAA) and a stop byte (0xAB):
//! - 19 bytes from host to sensor, 10 bytes from sensor to host
//! - a command kind byte selecting command, acknowledgement or telemetry
//! - a big-endian device id and an 8-bit additive checksum
//!
//! The [`StreamFramer`] turns an unreliable byte stream into frames, and
//! [`Transport`] moves whole frames over a link.

pub mod clock;
pub mod codec;
pub mod command;
pub mod error;
pub mod framer;
pub mod kind;
pub mod link;
pub mod reader;
pub mod writer;

pub use clock::uptime_millis;
pub use codec::{
    checksum, decode_frame, encode_frame, enough_bytes, trim_to_last_start, Frame, FrameConfig,
    DEFAULT_READ_CHUNK,
};
pub use command::Telemetry;
pub use error::{DecodeError, FrameError, Result};
pub use framer::{Received, StreamFramer};
pub use kind::{
    CommandKind, DeviceId, FunctionNumber, ParseDeviceIdError, FROM_DEVICE_LEN, START_BYTE,
    STOP_BYTE, TO_DEVICE_LEN,
};
pub use link::{FramedLink, Transport};
pub use reader::FrameReader;
pub use writer::FrameWriter;

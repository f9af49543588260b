//! Frame constructors for every command and reply, plus typed field access.
//!
//! Host commands carry a 13-byte payload; replies and telemetry carry 4
//! bytes. The reply constructors exist for simulators and tests.

use std::fmt;
use std::fmt::Write as _;

use bytes::Bytes;

use crate::codec::Frame;
use crate::error::{FrameError, Result};
use crate::kind::{CommandKind, DeviceId, FunctionNumber, FRAME_OVERHEAD, TO_DEVICE_LEN};

const TO_DEVICE_PAYLOAD_LEN: usize = TO_DEVICE_LEN - FRAME_OVERHEAD;

fn command(id: DeviceId, function: FunctionNumber, args: &[u8]) -> Frame {
    let mut payload = [0u8; TO_DEVICE_PAYLOAD_LEN];
    payload[0] = function.as_byte();
    payload[1..1 + args.len()].copy_from_slice(args);
    Frame::from_parts(CommandKind::ToDevice, id, Bytes::copy_from_slice(&payload))
}

fn reply(id: DeviceId, function: FunctionNumber, args: [u8; 3]) -> Frame {
    let payload = [function.as_byte(), args[0], args[1], args[2]];
    Frame::from_parts(
        CommandKind::FromDeviceAck,
        id,
        Bytes::copy_from_slice(&payload),
    )
}

/// Read (`write == false`) or set the reporting mode. `query == true`
/// selects query mode, `false` active mode.
pub fn reporting_mode(id: DeviceId, write: bool, query: bool) -> Frame {
    command(
        id,
        FunctionNumber::ReportingMode,
        &[u8::from(write), u8::from(query)],
    )
}

pub fn reporting_mode_reply(id: DeviceId, write: bool, query: bool) -> Frame {
    reply(
        id,
        FunctionNumber::ReportingMode,
        [u8::from(write), u8::from(query), 0],
    )
}

/// Ask for one measurement. The sensor answers with a telemetry frame.
pub fn data_query(id: DeviceId) -> Frame {
    command(id, FunctionNumber::QueryTelemetry, &[])
}

/// Telemetry frame carrying raw PM2.5 and PM10 registers (tenths of µg/m³).
pub fn data_reply(id: DeviceId, small_reg: u16, large_reg: u16) -> Frame {
    let [s_lo, s_hi] = small_reg.to_le_bytes();
    let [l_lo, l_hi] = large_reg.to_le_bytes();
    Frame::from_parts(
        CommandKind::FromDeviceTelemetry,
        id,
        Bytes::copy_from_slice(&[s_lo, s_hi, l_lo, l_hi]),
    )
}

/// Assign `new_id` to the sensor currently answering to `id`.
///
/// The new id is persisted by the sensor. Use with care.
pub fn set_device_id(id: DeviceId, new_id: DeviceId) -> Frame {
    let mut args = [0u8; 12];
    args[10] = new_id.high();
    args[11] = new_id.low();
    command(id, FunctionNumber::SetDeviceId, &args)
}

/// The sensor replies from its new id.
pub fn set_device_id_reply(new_id: DeviceId) -> Frame {
    reply(new_id, FunctionNumber::SetDeviceId, [0, 0, 0])
}

/// Read or set sleep/work state. `work == true` means working.
pub fn sleep_work(id: DeviceId, write: bool, work: bool) -> Frame {
    command(
        id,
        FunctionNumber::SleepWork,
        &[u8::from(write), u8::from(work)],
    )
}

pub fn sleep_work_reply(id: DeviceId, write: bool, work: bool) -> Frame {
    reply(
        id,
        FunctionNumber::SleepWork,
        [u8::from(write), u8::from(work), 0],
    )
}

/// Read or set the working period in minutes (0 = continuous).
pub fn period(id: DeviceId, write: bool, minutes: u8) -> Frame {
    command(id, FunctionNumber::Period, &[u8::from(write), minutes])
}

pub fn period_reply(id: DeviceId, write: bool, minutes: u8) -> Frame {
    reply(id, FunctionNumber::Period, [u8::from(write), minutes, 0])
}

/// Query the firmware version date.
pub fn version(id: DeviceId) -> Frame {
    command(id, FunctionNumber::Version, &[])
}

pub fn version_reply(id: DeviceId, year: u8, month: u8, day: u8) -> Frame {
    reply(id, FunctionNumber::Version, [year, month, day])
}

/// Raw particulate registers from a telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telemetry {
    /// PM2.5 in tenths of µg/m³.
    pub small_reg: u16,
    /// PM10 in tenths of µg/m³.
    pub large_reg: u16,
}

impl Telemetry {
    pub fn pm2_5(&self) -> f64 {
        f64::from(self.small_reg) / 10.0
    }

    pub fn pm10(&self) -> f64 {
        f64::from(self.large_reg) / 10.0
    }
}

impl Frame {
    fn expect_function(&self, expected: FunctionNumber, accessor: &'static str) -> Result<()> {
        if self.kind() == CommandKind::FromDeviceTelemetry {
            return Err(FrameError::KindMismatch {
                accessor,
                kind: self.kind(),
            });
        }
        let found = self.payload()[0];
        if found != expected.as_byte() {
            return Err(FrameError::FunctionMismatch { expected, found });
        }
        Ok(())
    }

    /// Reporting mode carried by a mode command or reply. `true` = query mode.
    pub fn query_mode(&self) -> Result<bool> {
        self.expect_function(FunctionNumber::ReportingMode, "query_mode")?;
        Ok(self.payload()[2] > 0)
    }

    /// Work state carried by a sleep/work command or reply. `true` = working.
    pub fn work_mode(&self) -> Result<bool> {
        self.expect_function(FunctionNumber::SleepWork, "work_mode")?;
        Ok(self.payload()[2] > 0)
    }

    /// Working period in minutes.
    pub fn period(&self) -> Result<u8> {
        self.expect_function(FunctionNumber::Period, "period")?;
        Ok(self.payload()[2])
    }

    /// Firmware version formatted as `year.month.day`, without padding.
    pub fn version(&self) -> Result<String> {
        self.expect_function(FunctionNumber::Version, "version")?;
        let p = self.payload();
        Ok(format!("{}.{}.{}", p[1], p[2], p[3]))
    }

    /// Id assigned by a set-id frame: payload bytes 11..12 of a command, or
    /// the id field of the reply (the sensor answers from its new id).
    pub fn assigned_device_id(&self) -> Result<DeviceId> {
        self.expect_function(FunctionNumber::SetDeviceId, "assigned_device_id")?;
        match self.kind() {
            CommandKind::ToDevice => {
                let p = self.payload();
                Ok(DeviceId::from_bytes(p[11], p[12]))
            }
            _ => Ok(self.device_id()),
        }
    }

    /// Whether the frame is the write form of its function.
    ///
    /// Set-id is always a write; version and data queries never are.
    pub fn is_write(&self) -> bool {
        match self.function() {
            Some(f) if f.has_write_flag() => self.payload()[1] > 0,
            Some(FunctionNumber::SetDeviceId) => true,
            _ => false,
        }
    }

    /// Particulate registers from a telemetry frame.
    pub fn telemetry(&self) -> Result<Telemetry> {
        if self.kind() != CommandKind::FromDeviceTelemetry {
            return Err(FrameError::KindMismatch {
                accessor: "telemetry",
                kind: self.kind(),
            });
        }
        let p = self.payload();
        Ok(Telemetry {
            small_reg: u16::from_le_bytes([p[0], p[1]]),
            large_reg: u16::from_le_bytes([p[2], p[3]]),
        })
    }

    /// One line per wire byte, in the layout the datasheet uses.
    pub fn debug_dump(&self) -> String {
        let title = match self.kind() {
            CommandKind::ToDevice => "Query",
            CommandKind::FromDeviceAck => "Response",
            CommandKind::FromDeviceTelemetry => "datareply",
        };
        let mut out = format!("--- {title} ---\n");
        for (index, byte) in self.encode().iter().enumerate() {
            let _ = writeln!(out, "[{index}]={byte:02X}");
        }
        out.push_str("-----------\n");
        out
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<SDS011:{}:{} ", self.device_id(), self.kind().name())?;

        if let Ok(t) = self.telemetry() {
            return write!(f, "smallReg={} largeReg={}>", t.small_reg, t.large_reg);
        }

        f.write_str(if self.is_write() { "w:" } else { "r:" })?;
        match self.function() {
            Some(FunctionNumber::ReportingMode) => {
                let mode = if self.payload()[2] > 0 { "QUERY" } else { "ACTIVE" };
                write!(f, "mode:{mode}>")
            }
            Some(FunctionNumber::QueryTelemetry) => f.write_str("QUERY>"),
            Some(FunctionNumber::SetDeviceId) => match self.assigned_device_id() {
                Ok(id) => write!(f, "setId:{id}>"),
                Err(_) => f.write_str("setId:?>"),
            },
            Some(FunctionNumber::SleepWork) => {
                f.write_str(if self.payload()[2] > 0 { "WORK>" } else { "SLEEP>" })
            }
            Some(FunctionNumber::Period) => write!(f, "period={}>", self.payload()[2]),
            Some(FunctionNumber::Version) => {
                let p = self.payload();
                write!(f, "version:{}.{}.{}>", p[1], p[2], p[3])
            }
            None => write!(f, "INVALIDFUNCTION {}>", self.payload()[0]),
        }
    }
}

//! Frame markers, command kinds, function numbers and device ids.
//!
//! Host-to-device frames are 19 bytes long, device-to-host frames 10 bytes.
//! Every frame starts with [`START_BYTE`] and ends with [`STOP_BYTE`].

use std::fmt;
use std::str::FromStr;

/// First byte of every frame.
pub const START_BYTE: u8 = 0xAA;

/// Last byte of every frame.
pub const STOP_BYTE: u8 = 0xAB;

/// Total length of a host-to-device frame.
pub const TO_DEVICE_LEN: usize = 19;

/// Total length of a device-to-host frame (acknowledgement or telemetry).
pub const FROM_DEVICE_LEN: usize = 10;

/// Bytes around the payload: start, kind, id high, id low, checksum, stop.
pub const FRAME_OVERHEAD: usize = 6;

/// Direction/role marker carried in byte 1 of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandKind {
    /// Command sent by the host.
    ToDevice = 0xB4,
    /// Acknowledgement of a command, sent by the sensor.
    FromDeviceAck = 0xC5,
    /// Measurement report, sent by the sensor. Carries no function number.
    FromDeviceTelemetry = 0xC0,
}

impl CommandKind {
    /// Parse a wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0xB4 => Some(Self::ToDevice),
            0xC5 => Some(Self::FromDeviceAck),
            0xC0 => Some(Self::FromDeviceTelemetry),
            _ => None,
        }
    }

    /// Wire byte for this kind.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Exact total frame length for this kind.
    pub fn frame_len(self) -> usize {
        match self {
            Self::ToDevice => TO_DEVICE_LEN,
            Self::FromDeviceAck | Self::FromDeviceTelemetry => FROM_DEVICE_LEN,
        }
    }

    /// Exact payload length for this kind.
    pub fn payload_len(self) -> usize {
        self.frame_len() - FRAME_OVERHEAD
    }

    /// Short human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::ToDevice => "fromHost",
            Self::FromDeviceAck => "fromSensor",
            Self::FromDeviceTelemetry => "data",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.as_byte())
    }
}

/// Sub-command selector carried in payload byte 0 of command and
/// acknowledgement frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FunctionNumber {
    /// Active vs. query reporting. Stored in non-volatile memory.
    ReportingMode = 2,
    /// Request one measurement; answered with a telemetry frame.
    QueryTelemetry = 4,
    /// Change the device id. Stored in non-volatile memory.
    SetDeviceId = 5,
    /// Sleep or work.
    SleepWork = 6,
    /// Firmware version date.
    Version = 7,
    /// Working period. Stored in non-volatile memory.
    Period = 8,
}

impl FunctionNumber {
    /// Parse a wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            2 => Some(Self::ReportingMode),
            4 => Some(Self::QueryTelemetry),
            5 => Some(Self::SetDeviceId),
            6 => Some(Self::SleepWork),
            7 => Some(Self::Version),
            8 => Some(Self::Period),
            _ => None,
        }
    }

    /// Wire byte for this function.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns true if the function has separate read and write forms,
    /// selected by payload byte 1.
    pub fn has_write_flag(self) -> bool {
        matches!(self, Self::ReportingMode | Self::SleepWork | Self::Period)
    }

    /// Returns true if the sensor may acknowledge this function with a
    /// `FromDeviceAck` frame. Data queries are answered with telemetry.
    pub fn is_acknowledged(self) -> bool {
        self != Self::QueryTelemetry
    }

    /// Short human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::ReportingMode => "reporting-mode",
            Self::QueryTelemetry => "query-data",
            Self::SetDeviceId => "set-id",
            Self::SleepWork => "sleep-work",
            Self::Version => "version",
            Self::Period => "period",
        }
    }
}

impl fmt::Display for FunctionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_byte())
    }
}

/// 16-bit sensor identifier, sent high byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u16);

impl DeviceId {
    /// Wildcard id. Commands sent to it are accepted by every sensor, and
    /// a session configured with it accepts frames from every sensor.
    pub const ANY: DeviceId = DeviceId(0xFFFF);

    /// Returns true if either side is the wildcard or both are equal.
    pub fn matches(self, other: DeviceId) -> bool {
        self == Self::ANY || other == Self::ANY || self == other
    }

    pub fn is_any(self) -> bool {
        self == Self::ANY
    }

    pub fn high(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn low(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub fn from_bytes(high: u8, low: u8) -> Self {
        Self(u16::from_be_bytes([high, low]))
    }
}

impl From<u16> for DeviceId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// Error returned when a device id string is not 1-4 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid device id {0:?} (expected up to 4 hex digits, e.g. A160)")]
pub struct ParseDeviceIdError(String);

impl FromStr for DeviceId {
    type Err = ParseDeviceIdError;

    /// Parse hex, with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || digits.len() > 4 {
            return Err(ParseDeviceIdError(s.to_string()));
        }
        u16::from_str_radix(digits, 16)
            .map(DeviceId)
            .map_err(|_| ParseDeviceIdError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_kind_bytes_roundtrip() {
        for kind in [
            CommandKind::ToDevice,
            CommandKind::FromDeviceAck,
            CommandKind::FromDeviceTelemetry,
        ] {
            assert_eq!(CommandKind::from_byte(kind.as_byte()), Some(kind));
        }
        assert_eq!(CommandKind::from_byte(0x00), None);
        assert_eq!(CommandKind::from_byte(0xAA), None);
    }

    #[test]
    fn frame_and_payload_lengths() {
        assert_eq!(CommandKind::ToDevice.frame_len(), 19);
        assert_eq!(CommandKind::ToDevice.payload_len(), 13);
        assert_eq!(CommandKind::FromDeviceAck.payload_len(), 4);
        assert_eq!(CommandKind::FromDeviceTelemetry.frame_len(), 10);
    }

    #[test]
    fn function_numbers_match_datasheet() {
        assert_eq!(FunctionNumber::ReportingMode.as_byte(), 2);
        assert_eq!(FunctionNumber::QueryTelemetry.as_byte(), 4);
        assert_eq!(FunctionNumber::SetDeviceId.as_byte(), 5);
        assert_eq!(FunctionNumber::SleepWork.as_byte(), 6);
        assert_eq!(FunctionNumber::Version.as_byte(), 7);
        assert_eq!(FunctionNumber::Period.as_byte(), 8);
        assert_eq!(FunctionNumber::from_byte(3), None);
        assert_eq!(FunctionNumber::from_byte(9), None);
    }

    #[test]
    fn only_mode_work_and_period_carry_write_flag() {
        assert!(FunctionNumber::ReportingMode.has_write_flag());
        assert!(FunctionNumber::SleepWork.has_write_flag());
        assert!(FunctionNumber::Period.has_write_flag());
        assert!(!FunctionNumber::Version.has_write_flag());
        assert!(!FunctionNumber::SetDeviceId.has_write_flag());
        assert!(!FunctionNumber::QueryTelemetry.is_acknowledged());
    }

    #[test]
    fn device_id_wildcard_matches_both_ways() {
        let a160 = DeviceId(0xA160);
        assert!(a160.matches(DeviceId::ANY));
        assert!(DeviceId::ANY.matches(a160));
        assert!(a160.matches(DeviceId(0xA160)));
        assert!(!a160.matches(DeviceId(0xA001)));
    }

    #[test]
    fn device_id_bytes_are_big_endian() {
        let id = DeviceId(0xA160);
        assert_eq!((id.high(), id.low()), (0xA1, 0x60));
        assert_eq!(DeviceId::from_bytes(0xA1, 0x60), id);
    }

    #[test]
    fn device_id_parse_and_display() {
        assert_eq!("A160".parse::<DeviceId>().unwrap(), DeviceId(0xA160));
        assert_eq!("0xffff".parse::<DeviceId>().unwrap(), DeviceId::ANY);
        assert_eq!("1".parse::<DeviceId>().unwrap(), DeviceId(1));
        assert!("".parse::<DeviceId>().is_err());
        assert!("12345".parse::<DeviceId>().is_err());
        assert!("zz".parse::<DeviceId>().is_err());
        assert_eq!(DeviceId(0x0001).to_string(), "0001");
    }
}

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Longest working period the sensor accepts, in minutes.
pub const MAX_PERIOD: u8 = 30;

/// Sensor settings.
///
/// `query_mode` and `period` are stored in the sensor's non-volatile memory;
/// `version` is read-only and ignored when writing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// `true`: the sensor only reports when asked. `false`: it reports on its own.
    pub query_mode: bool,
    /// Working period in minutes. 0 means continuous operation.
    pub period: u8,
    /// Firmware version date, `year.month.day`.
    pub version: String,
}

impl Settings {
    /// Time between measurements: 30 s for continuous operation, otherwise
    /// `period` minutes.
    pub fn period_duration(&self) -> Duration {
        if self.period == 0 {
            Duration::from_secs(30)
        } else {
            Duration::from_secs(60 * u64::from(self.period))
        }
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.query_mode { "query" } else { "active" };
        write!(f, "mode={mode} period={}min", self.period)?;
        if !self.version.is_empty() {
            write!(f, " version={}", self.version)?;
        }
        Ok(())
    }
}

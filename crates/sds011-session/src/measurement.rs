use std::fmt;

use serde::Serialize;

/// One particulate reading as delivered to the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Measurement {
    /// Measurement counter after this reading was accounted for.
    pub counter: u64,
    /// Milliseconds since process start when the frame arrived.
    pub uptime_ms: u64,
    /// Sensor that sent the reading.
    pub device_id: u16,
    /// Raw PM2.5 register, tenths of µg/m³.
    pub small_reg: u16,
    /// Raw PM10 register, tenths of µg/m³.
    pub large_reg: u16,
}

impl Measurement {
    /// PM2.5 in µg/m³. Not humidity compensated.
    pub fn pm2_5(&self) -> f64 {
        f64::from(self.small_reg) / 10.0
    }

    /// PM10 in µg/m³. Not humidity compensated.
    pub fn pm10(&self) -> f64 {
        f64::from(self.large_reg) / 10.0
    }
}

/// Format milliseconds as `1h 2min 3sec`. Leading units are omitted while
/// they are zero.
pub fn format_uptime(ms: u64) -> String {
    const SEC: u64 = 1000;
    const MIN: u64 = 60 * SEC;
    const HOUR: u64 = 60 * MIN;

    let mut parts = Vec::with_capacity(3);
    let mut rest = ms;
    if ms > HOUR {
        parts.push(format!("{}h", rest / HOUR));
        rest %= HOUR;
    }
    if ms > MIN {
        parts.push(format!("{}min", rest / MIN));
        rest %= MIN;
    }
    parts.push(format!("{}sec", rest / SEC));
    parts.join(" ")
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "count={} {} PM2.5= {:.1}µg/m³ PM10= {:.1}µg/m³",
            self.counter,
            format_uptime(self.uptime_ms),
            self.pm2_5(),
            self.pm10()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(0), "0sec");
        assert_eq!(format_uptime(59_999), "59sec");
        assert_eq!(format_uptime(61_000), "1min 1sec");
        assert_eq!(format_uptime(3_723_000), "1h 2min 3sec");
        assert_eq!(format_uptime(3_605_000), "1h 0min 5sec");
    }

    #[test]
    fn display_line() {
        let m = Measurement {
            counter: 42,
            uptime_ms: 3_723_000,
            device_id: 0xA160,
            small_reg: 1236,
            large_reg: 2618,
        };
        assert_eq!(
            m.to_string(),
            "count=42 1h 2min 3sec PM2.5= 123.6µg/m³ PM10= 261.8µg/m³"
        );
    }
}

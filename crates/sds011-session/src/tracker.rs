use std::time::{Duration, Instant};

use crate::settings::Settings;

/// Slack allowed when deciding whether a full period has passed.
const PERIOD_SLACK: Duration = Duration::from_secs(1);

/// Counts sensor measurement cycles.
///
/// The sensor's laser wears with use, so the counter survives restarts and
/// never goes down. A telemetry frame only advances it once at least a period
/// (minus one second) has passed since the last counted frame. Extra replies
/// to data queries within a period are not counted.
#[derive(Debug, Clone)]
pub struct TelemetryTracker {
    counter: u64,
    prev: Instant,
}

impl TelemetryTracker {
    pub fn new(counter: u64, now: Instant) -> Self {
        Self { counter, prev: now }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Account for a telemetry frame received at `now` and return the
    /// resulting counter.
    ///
    /// In query mode the sensor may have run several cycles between queries,
    /// so the number of whole periods elapsed is added. In active mode each
    /// report is exactly one cycle.
    pub fn accept(&mut self, now: Instant, settings: &Settings) -> u64 {
        let period = settings.period_duration();
        let elapsed = now.saturating_duration_since(self.prev);

        if elapsed + PERIOD_SLACK >= period {
            let cycles = if settings.query_mode {
                u64::try_from(elapsed.as_millis() / period.as_millis()).unwrap_or(u64::MAX)
            } else {
                1
            };
            self.counter = self.counter.saturating_add(cycles);
            self.prev = now;
        }
        self.counter
    }

    /// Restart elapsed-time measurement from `now`, e.g. after the sensor was
    /// powered back on.
    pub fn rebaseline(&mut self, now: Instant) {
        self.prev = now;
    }
}

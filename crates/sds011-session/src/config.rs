use std::time::Duration;

use sds011_frame::DeviceId;

/// How long a request waits for its acknowledgement.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Delay before retrying a settings sync after the sensor went out of sync.
pub const DEFAULT_SETTINGS_RETRY: Duration = Duration::from_secs(3);

/// Configuration for a device session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Only frames from this id are handled; others are reported as detected
    /// sensors. [`DeviceId::ANY`] accepts every sensor.
    pub device_id: DeviceId,
    /// Listen only. Settings are never written.
    pub passive: bool,
    /// Acknowledgement timeout. Default: 500 ms.
    pub response_timeout: Duration,
    /// Wait before each sync attempt while out of sync. Default: 3 s.
    pub settings_retry: Duration,
    /// How often the settings keeper checks whether a sync is needed.
    /// Default: 1 s.
    pub sync_check_interval: Duration,
    /// Counter value restored from a previous run.
    pub initial_counter: u64,
    /// Error sink capacity. Default: 2.
    pub error_capacity: usize,
    /// Detected-sensor sink capacity. Default: 10.
    pub detected_capacity: usize,
    /// Measurement sink capacity. Default: 16. When full, the receive loop
    /// waits for the application instead of dropping readings.
    pub measurement_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_id: DeviceId::ANY,
            passive: false,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            settings_retry: DEFAULT_SETTINGS_RETRY,
            sync_check_interval: Duration::from_secs(1),
            initial_counter: 0,
            error_capacity: 2,
            detected_capacity: 10,
            measurement_capacity: 16,
        }
    }
}

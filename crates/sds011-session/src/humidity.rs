//! Empirical humidity compensation for SDS011 readings.
//!
//! The sensor over-reads in humid air because particles absorb water. These
//! curves come from field comparisons, not laboratory calibration.

/// Compensate a PM2.5 reading for relative humidity (percent).
pub fn normalize_pm25(pm25: f64, humidity: f64) -> f64 {
    pm25 / (1.0 + 0.48756 * (humidity / 100.0).powf(8.60068))
}

/// Compensate a PM10 reading for relative humidity (percent).
pub fn normalize_pm10(pm10: f64, humidity: f64) -> f64 {
    pm10 / (1.0 + 0.81559 * (humidity / 100.0).powf(5.83411))
}

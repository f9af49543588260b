//! Host-side session for an SDS011 particulate sensor.
//!
//! A [`Session`] sits on top of any [`sds011_frame::Transport`]. It matches
//! requests with acknowledgements, keeps sensor settings in sync, counts
//! measurement cycles and reports telemetry through bounded channels.

pub mod config;
pub mod counter;
pub mod error;
pub mod humidity;
pub mod mailbox;
pub mod measurement;
pub mod notify;
pub mod session;
pub mod settings;
pub mod tracker;

pub use config::{SessionConfig, DEFAULT_RESPONSE_TIMEOUT, DEFAULT_SETTINGS_RETRY};
pub use error::{Result, SessionError};
pub use humidity::{normalize_pm10, normalize_pm25};
pub use mailbox::AckSlot;
pub use measurement::{format_uptime, Measurement};
pub use notify::Notifier;
pub use session::{Session, SessionEvents};
pub use settings::{Settings, MAX_PERIOD};
pub use tracker::TelemetryTracker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use sds011_frame::{command, CommandKind, DeviceId, Frame, Received, Transport};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::mailbox::{lock, AckSlot};
use crate::measurement::Measurement;
use crate::notify::Notifier;
use crate::settings::{Settings, MAX_PERIOD};
use crate::tracker::TelemetryTracker;

/// Receiving ends of the session's notification channels.
pub struct SessionEvents {
    /// Every accepted telemetry frame, in arrival order.
    ///
    /// Unlike the other channels nothing is dropped here: once
    /// `measurement_capacity` readings are queued, the receive loop waits
    /// for room. While it waits no acknowledgement is processed, so requests
    /// time out even if the sensor answered. Keep draining this channel, or
    /// drop the receiver to discard readings.
    pub measurements: Receiver<Measurement>,
    /// Non-fatal problems: discarded bytes, wiring warnings, sync failures.
    /// Newest items are dropped while the channel is full.
    pub errors: Receiver<SessionError>,
    /// Ids of other sensors heard on the bus. Newest items are dropped while
    /// the channel is full.
    pub detected: Receiver<DeviceId>,
}

#[derive(Debug, Default)]
struct SettingsState {
    /// Desired settings once `changed`, otherwise the last values read.
    current: Settings,
    /// Set by the first `set_settings`. From then on syncing writes.
    changed: bool,
    in_sync: bool,
}

struct Shared {
    config: SessionConfig,
    ack: AckSlot,
    /// Serializes request/acknowledgement exchanges.
    exchange: Mutex<()>,
    settings: Mutex<SettingsState>,
    tracker: Mutex<TelemetryTracker>,
    power_enable: AtomicBool,
    running: AtomicBool,
    closed: Mutex<bool>,
    closed_changed: Condvar,
    measurements: Notifier<Measurement>,
    errors: Notifier<SessionError>,
    detected: Notifier<DeviceId>,
}

/// Host-side state machine for one sensor on a [`Transport`].
///
/// One thread drives [`run`](Self::run), which owns the receive side. Other
/// threads issue requests through clones of the session; each request blocks
/// until its acknowledgement arrives or the response timeout expires.
pub struct Session<T> {
    transport: Arc<T>,
    shared: Arc<Shared>,
}

impl<T> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transport> Session<T> {
    /// Create a session and the channels it reports through.
    pub fn new(transport: Arc<T>, config: SessionConfig) -> (Self, SessionEvents) {
        let (measurements, measurements_rx) =
            Notifier::channel("measurements", config.measurement_capacity);
        let (errors, errors_rx) = Notifier::channel("errors", config.error_capacity);
        let (detected, detected_rx) = Notifier::channel("detected", config.detected_capacity);

        let shared = Shared {
            tracker: Mutex::new(TelemetryTracker::new(
                config.initial_counter,
                Instant::now(),
            )),
            config,
            ack: AckSlot::new(),
            exchange: Mutex::new(()),
            settings: Mutex::new(SettingsState::default()),
            power_enable: AtomicBool::new(true),
            running: AtomicBool::new(false),
            closed: Mutex::new(false),
            closed_changed: Condvar::new(),
            measurements,
            errors,
            detected,
        };

        let session = Self {
            transport,
            shared: Arc::new(shared),
        };
        let events = SessionEvents {
            measurements: measurements_rx,
            errors: errors_rx,
            detected: detected_rx,
        };
        (session, events)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn device_id(&self) -> DeviceId {
        self.shared.config.device_id
    }

    /// Current measurement counter.
    pub fn counter(&self) -> u64 {
        lock(&self.shared.tracker).counter()
    }

    /// Desired settings, or the last settings read from the sensor if none
    /// were ever set.
    pub fn settings(&self) -> Settings {
        lock(&self.shared.settings).current.clone()
    }

    /// False until the first successful sync and after any request timeout.
    pub fn settings_in_sync(&self) -> bool {
        lock(&self.shared.settings).in_sync
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        *lock(&self.shared.closed)
    }

    /// Record the state of an external power switch for the sensor.
    ///
    /// While off, requests fail with [`SessionError::PowerDisabled`]. Switching
    /// back on restarts elapsed-time tracking so the off period is not
    /// counted as measurement cycles.
    pub fn power_line(&self, enabled: bool) {
        let was = self.shared.power_enable.swap(enabled, Ordering::SeqCst);
        if enabled && !was {
            lock(&self.shared.tracker).rebaseline(Instant::now());
            info!("power line enabled");
        } else if !enabled && was {
            info!("power line disabled");
        }
    }

    /// Send a command and wait for the sensor's acknowledgement.
    ///
    /// Only acknowledgement frames complete the wait; telemetry and echoed
    /// commands are routed elsewhere by the receive loop. A timeout marks the
    /// settings as out of sync.
    pub fn query_and_wait_response(&self, request: &Frame) -> Result<Frame> {
        let _exchange = lock(&self.shared.exchange);
        self.shared.ack.clear();

        if !self.shared.power_enable.load(Ordering::SeqCst) {
            return Err(SessionError::PowerDisabled);
        }
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        self.transport.send(request)?;

        let timeout = self.shared.config.response_timeout;
        match self.shared.ack.wait(timeout) {
            Some(reply) => {
                debug!(%request, %reply, "request acknowledged");
                Ok(reply)
            }
            None => {
                lock(&self.shared.settings).in_sync = false;
                warn!(%request, ?timeout, "no response from sensor");
                Err(SessionError::Timeout(timeout))
            }
        }
    }

    /// Read reporting mode, period and version from the sensor, in that order.
    ///
    /// Stored settings are not modified.
    pub fn read_settings(&self) -> Result<Settings> {
        let id = self.device_id();
        let query_mode = self
            .query_and_wait_response(&command::reporting_mode(id, false, false))?
            .query_mode()?;
        let period = self
            .query_and_wait_response(&command::period(id, false, 0))?
            .period()?;
        let version = self
            .query_and_wait_response(&command::version(id))?
            .version()?;

        Ok(Settings {
            query_mode,
            period,
            version,
        })
    }

    /// Store `desired` and bring the sensor in line with it.
    ///
    /// The sensor is read first and only differing fields are written, to
    /// spare its non-volatile memory. Each write is verified against the
    /// sensor's echo. `version` is never written.
    pub fn set_settings(&self, desired: Settings) -> Result<Settings> {
        if desired.period > MAX_PERIOD {
            return Err(SessionError::InvalidPeriod(desired.period));
        }
        self.ensure_writable()?;

        {
            let mut state = lock(&self.shared.settings);
            state.current = desired;
            state.changed = true;
        }
        self.reconcile()
    }

    /// Make stored and sensor settings agree.
    ///
    /// Passive sessions return the stored settings without any traffic. If
    /// settings were never set, the sensor's settings are read and adopted;
    /// otherwise the sensor is reconciled as in [`set_settings`](Self::set_settings).
    pub fn sync_settings(&self) -> Result<Settings> {
        if self.shared.config.passive {
            let mut state = lock(&self.shared.settings);
            state.in_sync = true;
            return Ok(state.current.clone());
        }

        if lock(&self.shared.settings).changed {
            return self.reconcile();
        }

        let on_sensor = self.read_settings()?;
        let mut state = lock(&self.shared.settings);
        state.current = on_sensor.clone();
        state.in_sync = true;
        info!(settings = %on_sensor, "adopted sensor settings");
        Ok(on_sensor)
    }

    /// Put the sensor to work (`true`) or to sleep (`false`) and verify.
    pub fn change_to_work(&self, work: bool) -> Result<()> {
        let reply =
            self.query_and_wait_response(&command::sleep_work(self.device_id(), true, work))?;
        let reported = reply.work_mode()?;
        if reported != work {
            return Err(SessionError::VerifyFailed {
                setting: "work",
                value: work.to_string(),
                reported: reported.to_string(),
            });
        }
        info!(work, "work state changed");
        Ok(())
    }

    /// Whether the sensor is working (as opposed to sleeping).
    pub fn is_working(&self) -> Result<bool> {
        let reply =
            self.query_and_wait_response(&command::sleep_work(self.device_id(), false, false))?;
        Ok(reply.work_mode()?)
    }

    /// Ask for a measurement. The reading arrives on the measurement channel.
    pub fn query_data(&self) -> Result<()> {
        if !self.shared.power_enable.load(Ordering::SeqCst) {
            return Err(SessionError::PowerDisabled);
        }
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        self.transport.send(&command::data_query(self.device_id()))?;
        Ok(())
    }

    /// Receive loop. Blocks until the session is closed or the transport
    /// fails.
    ///
    /// Returns `Ok(())` after [`close`](Self::close), or the transport error
    /// that ended the loop.
    pub fn run(&self) -> Result<()> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyRunning);
        }
        info!(
            device_id = %self.device_id(),
            passive = self.shared.config.passive,
            "receive loop started"
        );

        let result = self.receive_loop();
        self.shared.running.store(false, Ordering::SeqCst);

        match &result {
            Ok(()) => info!("receive loop stopped"),
            Err(err) => warn!(error = %err, "receive loop failed"),
        }
        result
    }

    /// Stop the session and close the transport. Idempotent.
    pub fn close(&self) -> Result<()> {
        {
            let mut closed = lock(&self.shared.closed);
            if *closed {
                return Ok(());
            }
            *closed = true;
        }
        self.shared.closed_changed.notify_all();
        self.transport.close()?;
        info!("session closed");
        Ok(())
    }

    fn receive_loop(&self) -> Result<()> {
        loop {
            if self.is_closed() {
                return Ok(());
            }
            match self.transport.receive() {
                Ok(None) => {}
                Ok(Some(Received::Frame(frame))) => self.handle_frame(frame),
                Ok(Some(Received::Discarded(err))) => {
                    self.shared.errors.notify(SessionError::Discarded(err));
                }
                Err(_) if self.is_closed() => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn handle_frame(&self, frame: Frame) {
        if !frame.matches_id(self.device_id()) {
            debug!(device_id = %frame.device_id(), "frame from another sensor");
            self.shared.detected.notify(frame.device_id());
            return;
        }

        if !self.shared.power_enable.load(Ordering::SeqCst) {
            warn!(%frame, "frame received while power line is off");
            self.shared
                .errors
                .notify(SessionError::PowerSwitch(frame.to_string()));
        }

        match frame.kind() {
            CommandKind::FromDeviceTelemetry => self.accept_telemetry(&frame),
            CommandKind::FromDeviceAck => self.shared.ack.deliver(frame),
            CommandKind::ToDevice => {
                warn!(%frame, "host command on receive side");
                self.shared
                    .errors
                    .notify(SessionError::Misdirected(frame.to_string()));
            }
        }
    }

    fn accept_telemetry(&self, frame: &Frame) {
        let telemetry = match frame.telemetry() {
            Ok(t) => t,
            Err(err) => {
                self.shared.errors.notify(err.into());
                return;
            }
        };

        let settings = self.settings();
        let counter = lock(&self.shared.tracker).accept(Instant::now(), &settings);

        let measurement = Measurement {
            counter,
            uptime_ms: frame.timestamp(),
            device_id: frame.device_id().0,
            small_reg: telemetry.small_reg,
            large_reg: telemetry.large_reg,
        };
        debug!(%measurement, "measurement");
        self.shared.measurements.deliver(measurement);
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.shared.config.passive {
            return Err(SessionError::WriteNotAllowed);
        }
        Ok(())
    }

    fn reconcile(&self) -> Result<Settings> {
        let on_sensor = self.read_settings()?;
        let desired = {
            let mut state = lock(&self.shared.settings);
            state.current.version = on_sensor.version.clone();
            state.current.clone()
        };

        if desired.period != on_sensor.period {
            self.write_period(desired.period)?;
        }
        if desired.query_mode != on_sensor.query_mode {
            self.write_query_mode(desired.query_mode)?;
        }

        lock(&self.shared.settings).in_sync = true;
        info!(settings = %desired, "settings in sync");
        Ok(desired)
    }

    fn write_period(&self, minutes: u8) -> Result<()> {
        self.ensure_writable()?;
        let reply =
            self.query_and_wait_response(&command::period(self.device_id(), true, minutes))?;
        let reported = reply.period()?;
        if reported != minutes {
            return Err(SessionError::VerifyFailed {
                setting: "period",
                value: minutes.to_string(),
                reported: reported.to_string(),
            });
        }
        Ok(())
    }

    fn write_query_mode(&self, query_mode: bool) -> Result<()> {
        self.ensure_writable()?;
        let reply = self.query_and_wait_response(&command::reporting_mode(
            self.device_id(),
            true,
            query_mode,
        ))?;
        let reported = reply.query_mode()?;
        if reported != query_mode {
            return Err(SessionError::VerifyFailed {
                setting: "query mode",
                value: query_mode.to_string(),
                reported: reported.to_string(),
            });
        }
        Ok(())
    }

    /// Wait up to `timeout` for the session to close. Returns true if closed.
    fn wait_closed(&self, timeout: Duration) -> bool {
        let guard = lock(&self.shared.closed);
        let (guard, _) = self
            .shared
            .closed_changed
            .wait_timeout_while(guard, timeout, |closed| !*closed)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard
    }

    fn keep_settings(&self) {
        debug!("settings keeper started");
        loop {
            let pause = if self.settings_in_sync() {
                self.shared.config.sync_check_interval
            } else {
                self.shared.config.settings_retry
            };
            if self.wait_closed(pause) {
                break;
            }
            if self.settings_in_sync() {
                continue;
            }
            match self.sync_settings() {
                Ok(settings) => debug!(%settings, "settings resynced"),
                Err(err) => {
                    warn!(error = %err, "settings sync failed");
                    self.shared.errors.notify(err);
                }
            }
        }
        debug!("settings keeper stopped");
    }
}

impl<T: Transport + 'static> Session<T> {
    /// Start a background thread that resyncs settings whenever they fall out
    /// of sync, retrying every `settings_retry`. It stops when the session is
    /// closed. Failures are reported on the error channel.
    pub fn spawn_settings_keeper(&self) -> std::io::Result<JoinHandle<()>> {
        let session = self.clone();
        thread::Builder::new()
            .name("sds011-settings".into())
            .spawn(move || session.keep_settings())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use sds011_frame::{DecodeError, FrameError, FunctionNumber};

    use super::*;

    const A160: DeviceId = DeviceId(0xA160);
    const WAIT: Duration = Duration::from_secs(2);

    struct SensorState {
        query_mode: bool,
        period: u8,
        working: bool,
    }

    #[derive(Default)]
    struct Behavior {
        silent: bool,
        ignore_writes: bool,
    }

    /// In-memory sensor answering like the real device.
    struct SimSensor {
        id: DeviceId,
        state: Mutex<SensorState>,
        behavior: Mutex<Behavior>,
        inbox: Mutex<VecDeque<Received>>,
        sent: Mutex<Vec<Frame>>,
        closed: AtomicBool,
    }

    impl SimSensor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: A160,
                state: Mutex::new(SensorState {
                    query_mode: false,
                    period: 0,
                    working: true,
                }),
                behavior: Mutex::new(Behavior::default()),
                inbox: Mutex::new(VecDeque::new()),
                sent: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            })
        }

        fn with_state(query_mode: bool, period: u8) -> Arc<Self> {
            let sim = Self::new();
            {
                let mut state = lock(&sim.state);
                state.query_mode = query_mode;
                state.period = period;
            }
            sim
        }

        fn set_silent(&self, silent: bool) {
            lock(&self.behavior).silent = silent;
        }

        fn inject(&self, received: Received) {
            lock(&self.inbox).push_back(received);
        }

        fn inject_frame(&self, frame: Frame) {
            self.inject(Received::Frame(frame));
        }

        fn sent(&self) -> Vec<Frame> {
            lock(&self.sent).clone()
        }

        fn writes(&self) -> Vec<Frame> {
            self.sent().into_iter().filter(Frame::is_write).collect()
        }

        fn respond(&self, request: &Frame) -> Option<Frame> {
            let behavior = lock(&self.behavior);
            if behavior.silent || !request.matches_id(self.id) {
                return None;
            }
            let write = request.is_write();
            let apply = write && !behavior.ignore_writes;
            let value = request.payload()[2];
            let mut state = lock(&self.state);

            match request.function()? {
                FunctionNumber::ReportingMode => {
                    if apply {
                        state.query_mode = value > 0;
                    }
                    Some(command::reporting_mode_reply(self.id, write, state.query_mode))
                }
                FunctionNumber::Period => {
                    if apply {
                        state.period = value;
                    }
                    Some(command::period_reply(self.id, write, state.period))
                }
                FunctionNumber::SleepWork => {
                    if apply {
                        state.working = value > 0;
                    }
                    Some(command::sleep_work_reply(self.id, write, state.working))
                }
                FunctionNumber::Version => Some(command::version_reply(self.id, 15, 7, 10)),
                FunctionNumber::QueryTelemetry => Some(command::data_reply(self.id, 123, 456)),
                FunctionNumber::SetDeviceId => None,
            }
        }
    }

    impl Transport for SimSensor {
        fn send(&self, frame: &Frame) -> sds011_frame::Result<()> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(FrameError::ConnectionClosed);
            }
            lock(&self.sent).push(frame.clone());
            if let Some(reply) = self.respond(frame) {
                self.inject_frame(reply);
            }
            Ok(())
        }

        fn receive(&self) -> sds011_frame::Result<Option<Received>> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(FrameError::ConnectionClosed);
            }
            if let Some(received) = lock(&self.inbox).pop_front() {
                return Ok(Some(received));
            }
            thread::sleep(Duration::from_millis(2));
            Ok(None)
        }

        fn close(&self) -> sds011_frame::Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            device_id: A160,
            response_timeout: Duration::from_millis(200),
            ..SessionConfig::default()
        }
    }

    fn start(
        sensor: &Arc<SimSensor>,
        config: SessionConfig,
    ) -> (Session<SimSensor>, SessionEvents, JoinHandle<Result<()>>) {
        let (session, events) = Session::new(Arc::clone(sensor), config);
        let runner = session.clone();
        let handle = thread::spawn(move || runner.run());
        (session, events, handle)
    }

    fn stop(session: Session<SimSensor>, handle: JoinHandle<Result<()>>) {
        session.close().unwrap();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn request_timeout_leaves_counter_unchanged() {
        let sensor = SimSensor::new();
        sensor.set_silent(true);
        let (session, _events, handle) = start(
            &sensor,
            SessionConfig {
                initial_counter: 5,
                ..config()
            },
        );

        let err = session.is_working().unwrap_err();
        assert!(matches!(err, SessionError::Timeout(t) if t == Duration::from_millis(200)));
        assert_eq!(session.counter(), 5);
        assert!(!session.settings_in_sync());
        stop(session, handle);
    }

    #[test]
    fn matching_settings_only_read() {
        let sensor = SimSensor::with_state(false, 0);
        let (session, _events, handle) = start(&sensor, config());

        let applied = session
            .set_settings(Settings {
                query_mode: false,
                period: 0,
                version: String::new(),
            })
            .unwrap();
        assert_eq!(applied.version, "15.7.10");

        let functions: Vec<_> = sensor.sent().iter().map(Frame::function).collect();
        assert_eq!(
            functions,
            vec![
                Some(FunctionNumber::ReportingMode),
                Some(FunctionNumber::Period),
                Some(FunctionNumber::Version)
            ]
        );
        assert!(sensor.writes().is_empty());
        assert!(session.settings_in_sync());
        stop(session, handle);
    }

    #[test]
    fn differing_settings_write_each_field_once() {
        let sensor = SimSensor::with_state(false, 0);
        let (session, _events, handle) = start(&sensor, config());

        session
            .set_settings(Settings {
                query_mode: true,
                period: 5,
                version: String::new(),
            })
            .unwrap();

        let writes = sensor.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].period().unwrap(), 5);
        assert!(writes[1].query_mode().unwrap());
        assert_eq!(sensor.sent().len(), 5);

        let state = lock(&sensor.state);
        assert!(state.query_mode);
        assert_eq!(state.period, 5);
        drop(state);
        stop(session, handle);
    }

    #[test]
    fn only_period_differs() {
        let sensor = SimSensor::with_state(true, 1);
        let (session, _events, handle) = start(&sensor, config());

        session
            .set_settings(Settings {
                query_mode: true,
                period: 3,
                version: String::new(),
            })
            .unwrap();

        let writes = sensor.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].function(), Some(FunctionNumber::Period));
        stop(session, handle);
    }

    #[test]
    fn invalid_period_rejected_before_any_traffic() {
        let sensor = SimSensor::new();
        let (session, _events) = Session::new(Arc::clone(&sensor), config());

        let err = session
            .set_settings(Settings {
                query_mode: false,
                period: 31,
                version: String::new(),
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidPeriod(31)));
        assert!(sensor.sent().is_empty());
    }

    #[test]
    fn passive_session_refuses_writes() {
        let sensor = SimSensor::new();
        let (session, _events) = Session::new(
            Arc::clone(&sensor),
            SessionConfig {
                passive: true,
                ..config()
            },
        );

        let err = session.set_settings(Settings::default()).unwrap_err();
        assert!(matches!(err, SessionError::WriteNotAllowed));
        assert!(sensor.sent().is_empty());
    }

    #[test]
    fn passive_sync_returns_stored_without_traffic() {
        let sensor = SimSensor::new();
        let (session, _events) = Session::new(
            Arc::clone(&sensor),
            SessionConfig {
                passive: true,
                ..config()
            },
        );

        assert_eq!(session.sync_settings().unwrap(), Settings::default());
        assert!(session.settings_in_sync());
        assert!(sensor.sent().is_empty());
    }

    #[test]
    fn verify_failure_names_the_setting() {
        let sensor = SimSensor::with_state(false, 0);
        lock(&sensor.behavior).ignore_writes = true;
        let (session, _events, handle) = start(&sensor, config());

        let err = session
            .set_settings(Settings {
                query_mode: false,
                period: 3,
                version: String::new(),
            })
            .unwrap_err();
        match err {
            SessionError::VerifyFailed {
                setting,
                value,
                reported,
            } => {
                assert_eq!(setting, "period");
                assert_eq!(value, "3");
                assert_eq!(reported, "0");
            }
            other => panic!("unexpected error: {other}"),
        }
        stop(session, handle);
    }

    #[test]
    fn sync_adopts_sensor_settings_when_never_set() {
        let sensor = SimSensor::with_state(true, 4);
        let (session, _events, handle) = start(&sensor, config());

        let adopted = session.sync_settings().unwrap();
        assert_eq!(
            adopted,
            Settings {
                query_mode: true,
                period: 4,
                version: "15.7.10".into(),
            }
        );
        assert_eq!(session.settings(), adopted);
        assert!(sensor.writes().is_empty());
        stop(session, handle);
    }

    #[test]
    fn read_failure_leaves_settings_untouched() {
        let sensor = SimSensor::with_state(true, 4);
        let (session, _events, handle) = start(&sensor, config());

        let adopted = session.sync_settings().unwrap();
        sensor.set_silent(true);

        assert!(matches!(
            session.read_settings(),
            Err(SessionError::Timeout(_))
        ));
        assert_eq!(session.settings(), adopted);
        assert!(!session.settings_in_sync());
        stop(session, handle);
    }

    #[test]
    fn power_disabled_blocks_requests() {
        let sensor = SimSensor::new();
        let (session, _events, handle) = start(&sensor, config());

        session.power_line(false);
        assert!(matches!(
            session.is_working(),
            Err(SessionError::PowerDisabled)
        ));
        assert!(matches!(
            session.query_data(),
            Err(SessionError::PowerDisabled)
        ));
        assert!(sensor.sent().is_empty());

        session.power_line(true);
        assert!(session.is_working().unwrap());
        stop(session, handle);
    }

    #[test]
    fn change_to_work_verifies_echo() {
        let sensor = SimSensor::new();
        let (session, _events, handle) = start(&sensor, config());

        session.change_to_work(false).unwrap();
        assert!(!lock(&sensor.state).working);
        assert!(!session.is_working().unwrap());

        lock(&sensor.behavior).ignore_writes = true;
        let err = session.change_to_work(true).unwrap_err();
        assert!(matches!(
            err,
            SessionError::VerifyFailed {
                setting: "work",
                ..
            }
        ));
        stop(session, handle);
    }

    #[test]
    fn telemetry_is_forwarded_with_counter() {
        let sensor = SimSensor::new();
        let (session, events, handle) = start(
            &sensor,
            SessionConfig {
                initial_counter: 10,
                ..config()
            },
        );

        sensor.inject_frame(command::data_reply(A160, 1236, 2618).with_timestamp(1500));
        let m = events.measurements.recv_timeout(WAIT).unwrap();
        assert_eq!(m.counter, 10);
        assert_eq!(m.uptime_ms, 1500);
        assert_eq!(m.device_id, 0xA160);
        assert_eq!((m.small_reg, m.large_reg), (1236, 2618));
        stop(session, handle);
    }

    #[test]
    fn query_data_reply_arrives_as_measurement() {
        let sensor = SimSensor::new();
        let (session, events, handle) = start(&sensor, config());

        session.query_data().unwrap();
        let m = events.measurements.recv_timeout(WAIT).unwrap();
        assert_eq!(m.small_reg, 123);
        assert_eq!(m.large_reg, 456);
        assert_eq!(sensor.sent()[0].function(), Some(FunctionNumber::QueryTelemetry));
        stop(session, handle);
    }

    #[test]
    fn foreign_sensors_are_detected_and_bounded() {
        let sensor = SimSensor::new();
        let (session, events, handle) = start(&sensor, config());

        for _ in 0..12 {
            sensor.inject_frame(command::data_reply(DeviceId(0x1234), 1, 2));
        }
        sensor.inject_frame(command::data_reply(A160, 3, 4));
        let m = events.measurements.recv_timeout(WAIT).unwrap();
        assert_eq!(m.small_reg, 3);

        let detected: Vec<DeviceId> = events.detected.try_iter().collect();
        assert_eq!(detected, vec![DeviceId(0x1234); 10]);
        stop(session, handle);
    }

    #[test]
    fn host_command_on_receive_side_is_reported() {
        let sensor = SimSensor::new();
        let (session, events, handle) = start(&sensor, config());

        sensor.inject_frame(command::version(A160));
        let err = events.errors.recv_timeout(WAIT).unwrap();
        assert!(matches!(err, SessionError::Misdirected(_)));
        stop(session, handle);
    }

    #[test]
    fn discarded_bytes_are_reported() {
        let sensor = SimSensor::new();
        let (session, events, handle) = start(&sensor, config());

        sensor.inject(Received::Discarded(DecodeError::TooShort { len: 3 }));
        let err = events.errors.recv_timeout(WAIT).unwrap();
        assert!(matches!(
            err,
            SessionError::Discarded(DecodeError::TooShort { len: 3 })
        ));
        stop(session, handle);
    }

    #[test]
    fn telemetry_while_power_off_warns_but_is_delivered() {
        let sensor = SimSensor::new();
        let (session, events, handle) = start(&sensor, config());

        session.power_line(false);
        sensor.inject_frame(command::data_reply(A160, 7, 8));

        let err = events.errors.recv_timeout(WAIT).unwrap();
        assert!(matches!(err, SessionError::PowerSwitch(_)));
        let m = events.measurements.recv_timeout(WAIT).unwrap();
        assert_eq!(m.large_reg, 8);
        stop(session, handle);
    }

    #[test]
    fn second_run_is_rejected_and_close_ends_loop() {
        let sensor = SimSensor::new();
        let (session, _events, handle) = start(&sensor, config());

        let deadline = Instant::now() + WAIT;
        while !session.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(matches!(session.run(), Err(SessionError::AlreadyRunning)));

        session.close().unwrap();
        session.close().unwrap();
        handle.join().unwrap().unwrap();
        assert!(matches!(session.is_working(), Err(SessionError::Closed)));
    }

    #[test]
    fn transport_failure_ends_loop_with_error() {
        let sensor = SimSensor::new();
        let (_session, _events, handle) = start(&sensor, config());

        sensor.close().unwrap();
        let result = handle.join().unwrap();
        assert!(matches!(
            result,
            Err(SessionError::Frame(FrameError::ConnectionClosed))
        ));
    }

    #[test]
    fn settings_keeper_resyncs() {
        let sensor = SimSensor::with_state(true, 2);
        let (session, _events, handle) = start(
            &sensor,
            SessionConfig {
                settings_retry: Duration::from_millis(20),
                sync_check_interval: Duration::from_millis(20),
                ..config()
            },
        );
        let keeper = session.spawn_settings_keeper().unwrap();

        let deadline = Instant::now() + WAIT;
        while !session.settings_in_sync() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(session.settings_in_sync());
        assert_eq!(session.settings().period, 2);

        session.close().unwrap();
        keeper.join().unwrap();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn settings_keeper_reports_failures() {
        let sensor = SimSensor::new();
        sensor.set_silent(true);
        let (session, events, handle) = start(
            &sensor,
            SessionConfig {
                response_timeout: Duration::from_millis(10),
                settings_retry: Duration::from_millis(10),
                ..config()
            },
        );
        let keeper = session.spawn_settings_keeper().unwrap();

        let err = events.errors.recv_timeout(WAIT).unwrap();
        assert!(matches!(err, SessionError::Timeout(_)));

        session.close().unwrap();
        keeper.join().unwrap();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn undrained_measurements_stall_acknowledgements() {
        let sensor = SimSensor::new();
        let (session, events, handle) = start(
            &sensor,
            SessionConfig {
                measurement_capacity: 1,
                ..config()
            },
        );

        // The first reading fills the channel, the second blocks the loop.
        sensor.inject_frame(command::data_reply(A160, 1, 2));
        sensor.inject_frame(command::data_reply(A160, 3, 4));

        let err = session.is_working().unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));

        let first = events.measurements.recv_timeout(WAIT).unwrap();
        assert_eq!(first.small_reg, 1);
        assert!(session.is_working().unwrap());

        let second = events.measurements.recv_timeout(WAIT).unwrap();
        assert_eq!(second.small_reg, 3);
        stop(session, handle);
    }
}

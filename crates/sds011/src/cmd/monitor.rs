use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sds011_session::{counter, SessionConfig, Settings};
use tracing::{info, warn};

use crate::cmd::{MonitorArgs, RunningSession};
use crate::exit::{io_error, session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_measurement, OutputFormat};

const EVENT_WAIT: Duration = Duration::from_millis(200);

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let initial_counter = match &args.counter_file {
        Some(path) if path.exists() => {
            counter::load(path).map_err(|err| session_error("counter load failed", err))?
        }
        _ => 0,
    };

    let config = SessionConfig {
        device_id: args.device.id,
        passive: !args.writes_settings(),
        response_timeout: args.timeout,
        initial_counter,
        ..SessionConfig::default()
    };
    let running = RunningSession::start(&args.device, config)?;

    let active = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(active.clone())?;

    let keeper = running
        .session
        .spawn_settings_keeper()
        .map_err(|err| io_error("settings keeper failed to start", err))?;

    if args.writes_settings() {
        let desired = Settings {
            query_mode: args.query_mode,
            period: args.period.unwrap_or(0),
            version: String::new(),
        };
        match running.session.set_settings(desired) {
            Ok(settings) => info!(%settings, "sensor configured"),
            Err(err) => warn!(error = %err, "sensor not configured yet, retrying"),
        }
    }

    let mut printed = 0u64;
    let mut next_poll = Instant::now();

    while active.load(Ordering::SeqCst) {
        if let Some(interval) = args.poll {
            if Instant::now() >= next_poll {
                if let Err(err) = running.session.query_data() {
                    warn!(error = %err, "data query failed");
                }
                next_poll = Instant::now() + interval;
            }
        }

        match running.events.measurements.recv_timeout(EVENT_WAIT) {
            Ok(measurement) => {
                print_measurement(&measurement, format);
                save_counter(&args, measurement.counter);
                printed = printed.saturating_add(1);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        for id in running.events.detected.try_iter() {
            info!(device_id = %id, "another sensor is on the bus");
        }
        for err in running.events.errors.try_iter() {
            warn!(error = %err, "session reported a problem");
        }

        if args.count.is_some_and(|count| printed >= count) || running.receiver_finished() {
            break;
        }
    }

    save_counter(&args, running.session.counter());
    let result = running.stop();
    if keeper.join().is_err() {
        return Err(CliError::new(INTERNAL, "settings keeper panicked"));
    }
    result.map(|()| SUCCESS)
}

fn save_counter(args: &MonitorArgs, value: u64) {
    if let Some(path) = &args.counter_file {
        if let Err(err) = counter::save(path, value) {
            warn!(error = %err, "counter not saved");
        }
    }
}

fn install_ctrlc_handler(active: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        active.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

use sds011_session::SessionConfig;

use crate::cmd::{RunningSession, SettingsArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_settings, OutputFormat};

pub fn run(args: SettingsArgs, format: OutputFormat) -> CliResult<i32> {
    let config = SessionConfig {
        device_id: args.device.id,
        passive: true,
        response_timeout: args.timeout,
        ..SessionConfig::default()
    };
    let running = RunningSession::start(&args.device, config)?;

    let settings = running.session.read_settings();
    running.stop()?;
    let settings = settings.map_err(|err| session_error("reading settings failed", err))?;

    print_settings(args.device.id, &settings, format);
    Ok(SUCCESS)
}

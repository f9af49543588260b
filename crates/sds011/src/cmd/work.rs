use sds011_session::SessionConfig;

use crate::cmd::{RunningSession, WorkArgs, WorkState};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_work, OutputFormat};

pub fn run(args: WorkArgs, format: OutputFormat) -> CliResult<i32> {
    let config = SessionConfig {
        device_id: args.device.id,
        response_timeout: args.timeout,
        ..SessionConfig::default()
    };
    let running = RunningSession::start(&args.device, config)?;

    let result = match args.state {
        WorkState::On => running.session.change_to_work(true).map(|()| true),
        WorkState::Off => running.session.change_to_work(false).map(|()| false),
        WorkState::Status => running.session.is_working(),
    };
    running.stop()?;
    let working = result.map_err(|err| session_error("work request failed", err))?;

    print_work(args.device.id, working, format);
    Ok(SUCCESS)
}

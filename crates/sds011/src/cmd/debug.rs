use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sds011_frame::{Received, Transport};
use tracing::{debug, warn};

use crate::cmd::{open_link, DebugArgs};
use crate::exit::{frame_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: DebugArgs, format: OutputFormat) -> CliResult<i32> {
    let link = open_link(&args.device)?;

    let active = Arc::new(AtomicBool::new(true));
    let flag = active.clone();
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;

    let mut printed = 0usize;
    while active.load(Ordering::SeqCst) {
        let frame = match link.receive() {
            Ok(Some(Received::Frame(frame))) => frame,
            Ok(Some(Received::Discarded(err))) => {
                if args.discarded {
                    warn!(error = %err, "bytes discarded");
                }
                continue;
            }
            Ok(None) => continue,
            Err(err) => return Err(frame_error("receive failed", err)),
        };

        if !frame.matches_id(args.device.id) {
            debug!(device_id = %frame.device_id(), "frame for another sensor");
            continue;
        }

        if args.dump {
            print!("{}", frame.debug_dump());
        } else {
            print_frame(&frame, format);
        }
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    link.close().map_err(|err| frame_error("close failed", err))?;
    Ok(SUCCESS)
}

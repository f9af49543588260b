use sds011_frame::{decode_frame, FrameError};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex).map_err(|msg| CliError::new(USAGE, msg))?;
    let frame = decode_frame(0, &bytes)
        .map_err(|err| frame_error("decode failed", FrameError::Decode(err)))?;

    print_frame(&frame, format);
    if args.dump {
        print!("{}", frame.debug_dump());
    }
    Ok(SUCCESS)
}

/// Accepts `AA C0 ..`, `aac0..` and `0xAA 0xC0`, split across any number of
/// arguments.
fn parse_hex(parts: &[String]) -> Result<Vec<u8>, String> {
    let mut digits = String::new();
    for token in parts.iter().flat_map(|p| p.split_whitespace()) {
        let token = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        digits.push_str(token);
    }

    if digits.is_empty() {
        return Err("no bytes given".to_string());
    }
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits ({})", digits.len()));
    }
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(format!("invalid hex digit '{bad}'"));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|err| format!("invalid byte '{}': {err}", &digits[i..i + 2]))
        })
        .collect()
}

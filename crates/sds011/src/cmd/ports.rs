use crate::cmd::PortsArgs;
use crate::exit::{serial_error, CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(_args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    let ports =
        sds011_serial::available_ports().map_err(|err| serial_error("listing ports failed", err))?;
    print_ports(&ports, format);
    Ok(SUCCESS)
}

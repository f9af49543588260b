use std::path::Path;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{Result, SerialError};
use crate::stream::SerialStream;

/// The SDS011 UART runs at a fixed 9600 baud.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Line settings for opening the sensor port.
///
/// Data bits, parity and stop bits are fixed at 8N1; only the rate and the
/// read timeout are adjustable.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate. Default: 9600.
    pub baud_rate: u32,
    /// Read timeout. A read that sees no bytes within this window returns
    /// `TimedOut` instead of blocking. Default: 100 ms.
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(100),
        }
    }
}

/// Open the sensor's serial device.
///
/// The port is opened exclusively, so a second process cannot talk to the
/// same sensor at the same time.
pub fn open(path: impl AsRef<Path>, config: &SerialConfig) -> Result<SerialStream> {
    let path = path.as_ref();
    let name = path.to_string_lossy();

    let port = serialport::new(name.as_ref(), config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(config.read_timeout)
        .open()
        .map_err(|source| SerialError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    info!(?path, baud = config.baud_rate, "opened serial port");
    Ok(SerialStream::from_port(port))
}

/// A serial device found on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub name: String,
    /// Short description of the port kind (`usb`, `pci`, `bluetooth`, `unknown`).
    pub kind: &'static str,
    /// USB product string, when known.
    pub product: Option<String>,
}

/// List serial devices available on this machine.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(SerialError::Enumerate)?;
    debug!(count = ports.len(), "enumerated serial ports");

    Ok(ports
        .into_iter()
        .map(|port| {
            let (kind, product) = match port.port_type {
                SerialPortType::UsbPort(usb) => ("usb", usb.product),
                SerialPortType::PciPort => ("pci", None),
                SerialPortType::BluetoothPort => ("bluetooth", None),
                SerialPortType::Unknown => ("unknown", None),
            };
            PortInfo {
                name: port.port_name,
                kind,
                product,
            }
        })
        .collect())
}

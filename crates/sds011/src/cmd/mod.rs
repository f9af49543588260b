use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use sds011_frame::{DeviceId, FramedLink};
use sds011_serial::{SerialConfig, SerialStream};
use sds011_session::{Session, SessionConfig, SessionEvents, MAX_PERIOD};

use crate::exit::{frame_error, io_error, session_error, CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod debug;
pub mod decode;
pub mod monitor;
pub mod ports;
pub mod settings;
pub mod version;
pub mod work;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a session and print measurements.
    Monitor(MonitorArgs),
    /// Print every frame heard on the port.
    Debug(DebugArgs),
    /// Read and print the sensor settings.
    Settings(SettingsArgs),
    /// Put the sensor to work or to sleep, or show which it is doing.
    Work(WorkArgs),
    /// Decode hex-encoded frame bytes.
    Decode(DecodeArgs),
    /// List serial ports on this machine.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Monitor(args) => monitor::run(args, format),
        Command::Debug(args) => debug::run(args, format),
        Command::Settings(args) => settings::run(args, format),
        Command::Work(args) => work::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Serial device the sensor is attached to, e.g. /dev/ttyUSB0.
    pub port: PathBuf,
    /// Sensor id in hex (e.g. A160). FFFF talks to any sensor.
    #[arg(long, default_value = "FFFF")]
    pub id: DeviceId,
    /// Serial baud rate.
    #[arg(long, default_value_t = sds011_serial::DEFAULT_BAUD_RATE)]
    pub baud: u32,
}

impl DeviceArgs {
    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            baud_rate: self.baud,
            ..SerialConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Write this working period (minutes, 0 = continuous) to the sensor.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_PERIOD)))]
    pub period: Option<u8>,
    /// Put the sensor in query mode; it then only reports when asked.
    #[arg(long)]
    pub query_mode: bool,
    /// In query mode, ask for a measurement this often (e.g. 30s, 500ms).
    #[arg(long, value_parser = parse_duration, requires = "query_mode")]
    pub poll: Option<Duration>,
    /// File keeping the measurement counter across runs.
    #[arg(long, value_name = "PATH")]
    pub counter_file: Option<PathBuf>,
    /// Exit after N measurements.
    #[arg(long)]
    pub count: Option<u64>,
    /// Acknowledgement timeout (e.g. 500ms, 2s).
    #[arg(long, default_value = "500ms", value_parser = parse_duration)]
    pub timeout: Duration,
}

impl MonitorArgs {
    /// Writing settings is opt-in. Without `--period` or `--query-mode` the
    /// session only listens.
    pub fn writes_settings(&self) -> bool {
        self.period.is_some() || self.query_mode
    }
}

#[derive(Args, Debug)]
pub struct DebugArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Print each frame byte by byte instead of one line per frame.
    #[arg(long)]
    pub dump: bool,
    /// Also report bytes that did not decode.
    #[arg(long)]
    pub discarded: bool,
    /// Exit after N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SettingsArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Acknowledgement timeout (e.g. 500ms, 2s).
    #[arg(long, default_value = "500ms", value_parser = parse_duration)]
    pub timeout: Duration,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum WorkState {
    On,
    Off,
    Status,
}

#[derive(Args, Debug)]
pub struct WorkArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// `on` wakes the sensor, `off` puts it to sleep.
    #[arg(value_enum, default_value = "status")]
    pub state: WorkState,
    /// Acknowledgement timeout (e.g. 500ms, 2s).
    #[arg(long, default_value = "500ms", value_parser = parse_duration)]
    pub timeout: Duration,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes in hex. Whitespace and `0x` prefixes are ignored.
    #[arg(required = true, num_args = 1..)]
    pub hex: Vec<String>,
    /// Print the datasheet-style byte dump as well.
    #[arg(long)]
    pub dump: bool,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub type SerialLink = FramedLink<SerialStream, SerialStream>;

pub fn open_link(device: &DeviceArgs) -> CliResult<SerialLink> {
    FramedLink::open(&device.port, &device.serial_config())
        .map_err(|err| frame_error("open failed", err))
}

/// A session whose receive loop runs on a background thread.
pub struct RunningSession {
    pub session: Session<SerialLink>,
    pub events: SessionEvents,
    receiver: JoinHandle<sds011_session::Result<()>>,
}

impl RunningSession {
    pub fn start(device: &DeviceArgs, config: SessionConfig) -> CliResult<Self> {
        let link = open_link(device)?;
        let (session, events) = Session::new(Arc::new(link), config);

        let runner = session.clone();
        let receiver = thread::Builder::new()
            .name("sds011-receive".into())
            .spawn(move || runner.run())
            .map_err(|err| io_error("receive thread failed to start", err))?;

        Ok(Self {
            session,
            events,
            receiver,
        })
    }

    /// True once the receive loop has ended, normally because the link failed.
    pub fn receiver_finished(&self) -> bool {
        self.receiver.is_finished()
    }

    /// Close the session and wait for the receive loop to end.
    pub fn stop(self) -> CliResult<()> {
        let Self {
            session,
            events,
            receiver,
        } = self;
        // Dropping the receivers unblocks a loop waiting on a full
        // measurement channel.
        drop(events);
        session
            .close()
            .map_err(|err| session_error("close failed", err))?;

        match receiver.join() {
            Ok(result) => result.map_err(|err| session_error("receive failed", err)),
            Err(_) => Err(CliError::new(INTERNAL, "receive thread panicked")),
        }
    }
}

/// Parse `500ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {input}"))?;
    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

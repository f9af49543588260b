use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use sds011_frame::{DeviceId, Frame};
use sds011_serial::PortInfo;
use sds011_session::{format_uptime, Measurement, Settings};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MeasurementOutput<'a> {
    #[serde(flatten)]
    measurement: &'a Measurement,
    device: String,
    pm2_5: f64,
    pm10: f64,
}

pub fn print_measurement(measurement: &Measurement, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&MeasurementOutput {
            measurement,
            device: DeviceId(measurement.device_id).to_string(),
            pm2_5: measurement.pm2_5(),
            pm10: measurement.pm10(),
        }),
        OutputFormat::Table => print_table(
            vec!["COUNT", "UPTIME", "DEVICE", "PM2.5 µg/m³", "PM10 µg/m³"],
            vec![vec![
                measurement.counter.to_string(),
                format_uptime(measurement.uptime_ms),
                DeviceId(measurement.device_id).to_string(),
                format!("{:.1}", measurement.pm2_5()),
                format!("{:.1}", measurement.pm10()),
            ]],
        ),
        OutputFormat::Pretty => println!("{measurement}"),
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    kind: &'a str,
    device: String,
    function: Option<&'a str>,
    write: bool,
    summary: String,
    bytes: String,
    timestamp_ms: u64,
}

pub fn print_frame(frame: &Frame, format: OutputFormat) {
    let function = frame.function().map(|f| f.name());
    match format {
        OutputFormat::Json => print_json(&FrameOutput {
            kind: frame.kind().name(),
            device: frame.device_id().to_string(),
            function,
            write: frame.is_write(),
            summary: frame.to_string(),
            bytes: hex_string(&frame.encode()),
            timestamp_ms: frame.timestamp(),
        }),
        OutputFormat::Table => print_table(
            vec!["KIND", "DEVICE", "FUNCTION", "FRAME", "BYTES"],
            vec![vec![
                frame.kind().name().to_string(),
                frame.device_id().to_string(),
                function.unwrap_or("-").to_string(),
                frame.to_string(),
                hex_string(&frame.encode()),
            ]],
        ),
        OutputFormat::Pretty => println!("{frame}"),
    }
}

#[derive(Serialize)]
struct SettingsOutput<'a> {
    device: String,
    #[serde(flatten)]
    settings: &'a Settings,
}

pub fn print_settings(device: DeviceId, settings: &Settings, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&SettingsOutput {
            device: device.to_string(),
            settings,
        }),
        OutputFormat::Table => {
            let mode = if settings.query_mode { "query" } else { "active" };
            print_table(
                vec!["DEVICE", "MODE", "PERIOD", "VERSION"],
                vec![vec![
                    device.to_string(),
                    mode.to_string(),
                    format!("{} min", settings.period),
                    settings.version.clone(),
                ]],
            );
        }
        OutputFormat::Pretty => println!("{device} {settings}"),
    }
}

#[derive(Serialize)]
struct WorkOutput {
    device: String,
    working: bool,
}

pub fn print_work(device: DeviceId, working: bool, format: OutputFormat) {
    let state = if working { "working" } else { "sleeping" };
    match format {
        OutputFormat::Json => print_json(&WorkOutput {
            device: device.to_string(),
            working,
        }),
        OutputFormat::Table => print_table(
            vec!["DEVICE", "STATE"],
            vec![vec![device.to_string(), state.to_string()]],
        ),
        OutputFormat::Pretty => println!("{device} {state}"),
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    product: Option<&'a str>,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = ports
                .iter()
                .map(|p| PortOutput {
                    name: &p.name,
                    kind: p.kind,
                    product: p.product.as_deref(),
                })
                .collect();
            print_json(&out);
        }
        OutputFormat::Table => print_table(
            vec!["PORT", "KIND", "PRODUCT"],
            ports
                .iter()
                .map(|p| {
                    vec![
                        p.name.clone(),
                        p.kind.to_string(),
                        p.product.clone().unwrap_or_default(),
                    ]
                })
                .collect(),
        ),
        OutputFormat::Pretty => {
            for p in ports {
                match &p.product {
                    Some(product) => println!("{} ({}, {product})", p.name, p.kind),
                    None => println!("{} ({})", p.name, p.kind),
                }
            }
        }
    }
}

/// Space-separated uppercase hex, the way the datasheet writes frames.
pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_table(header: Vec<&str>, rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_string_matches_datasheet_layout() {
        assert_eq!(hex_string(&[0xAA, 0xC0, 0x0B, 0xAB]), "AA C0 0B AB");
        assert_eq!(hex_string(&[]), "");
    }

    #[test]
    fn measurement_json_carries_raw_and_scaled_values() {
        let m = Measurement {
            counter: 3,
            uptime_ms: 61_000,
            device_id: 0xA160,
            small_reg: 123,
            large_reg: 456,
        };
        let out = MeasurementOutput {
            measurement: &m,
            device: DeviceId(m.device_id).to_string(),
            pm2_5: m.pm2_5(),
            pm10: m.pm10(),
        };
        let json: serde_json::Value = serde_json::to_value(&out).unwrap();
        assert_eq!(json["counter"], 3);
        assert_eq!(json["small_reg"], 123);
        assert_eq!(json["device"], "A160");
        assert!((json["pm10"].as_f64().unwrap() - 45.6).abs() < 1e-9);
    }
}

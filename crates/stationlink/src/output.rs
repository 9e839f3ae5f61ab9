use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use stationlink_device::Disconnect;
use stationlink_frame::routing::module_name;
use stationlink_frame::Frame;
use stationlink_protocol::{SerialInfo, Snapshot};

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
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
#[serde(tag = "event", rename_all = "snake_case")]
enum Record<'a> {
    Telemetry {
        channel: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        pack: Option<u8>,
        key: String,
        timestamp: String,
        fields: &'a Snapshot,
    },
    Disconnect {
        #[serde(skip_serializing_if = "Option::is_none")]
        pack: Option<u8>,
        timestamp: String,
    },
    ExtraBattery {
        name: String,
        serial: &'a str,
        pack: u8,
        timestamp: String,
    },
    Serial {
        #[serde(flatten)]
        info: &'a SerialInfo,
        product_name: String,
    },
    Frame {
        key: String,
        module: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        channel: Option<&'a str>,
        payload_size: usize,
        payload: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        fields: Option<&'a Snapshot>,
    },
}

fn print_json(record: &Record<'_>) {
    println!(
        "{}",
        serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn channel_label(channel: &str, pack: Option<u8>) -> String {
    match pack {
        Some(pack) => format!("{channel}[{pack}]"),
        None => channel.to_string(),
    }
}

pub fn print_snapshot(
    channel: &str,
    pack: Option<u8>,
    frame: &Frame,
    snapshot: &Snapshot,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&Record::Telemetry {
            channel,
            pack,
            key: frame.key.to_string(),
            timestamp: now_unix_seconds(),
            fields: snapshot,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            for (name, value) in snapshot.iter() {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{}", channel_label(channel, pack));
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} {}",
                channel_label(channel, pack),
                fields_inline(snapshot)
            );
        }
    }
}

pub fn print_disconnect(event: Disconnect, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&Record::Disconnect {
            pack: event.pack,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table | OutputFormat::Pretty => match event.pack {
            Some(pack) => println!("disconnected pack={pack}"),
            None => println!("disconnected"),
        },
    }
}

pub fn print_extra_battery(name: String, serial: &str, pack: u8, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&Record::ExtraBattery {
            name,
            serial,
            pack,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("extra battery pack={pack} serial={serial} name=\"{name}\"");
        }
    }
}

pub fn print_serial(info: &SerialInfo, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&Record::Serial {
            info,
            product_name: info.product.to_string(),
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            table
                .add_row(vec!["serial".to_string(), info.serial.clone()])
                .add_row(vec!["product".to_string(), info.product.to_string()])
                .add_row(vec!["product_code".to_string(), info.product.code().to_string()])
                .add_row(vec!["product_detail".to_string(), info.product_detail.to_string()])
                .add_row(vec!["model".to_string(), info.model.to_string()])
                .add_row(vec!["cpu_id".to_string(), info.cpu_id.clone()])
                .add_row(vec!["checksum".to_string(), format!("{:#010x}", info.checksum)]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "serial={} product=\"{}\" model={} cpu_id={}",
                info.serial, info.product, info.model, info.cpu_id
            );
        }
    }
}

/// One decoded frame from a capture. `fields` is set when the frame's
/// channel has a layout for the product.
pub fn print_frame(
    frame: &Frame,
    channel: Option<&str>,
    fields: Option<&Snapshot>,
    format: OutputFormat,
) {
    let module = module_name(frame.key.dest);
    match format {
        OutputFormat::Json => print_json(&Record::Frame {
            key: frame.key.to_string(),
            module,
            channel,
            payload_size: frame.payload.len(),
            payload: hex(&frame.payload),
            fields,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["KEY", "MODULE", "CHANNEL", "SIZE", "FIELDS"]);
            table.add_row(vec![
                frame.key.to_string(),
                module.to_string(),
                channel.unwrap_or("-").to_string(),
                frame.payload.len().to_string(),
                fields.map(fields_inline).unwrap_or_else(|| hex(&frame.payload)),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} {} size={} {}",
                frame.key,
                channel.unwrap_or(module),
                frame.payload.len(),
                fields.map(fields_inline).unwrap_or_else(|| hex(&frame.payload)),
            );
        }
    }
}

fn fields_inline(snapshot: &Snapshot) -> String {
    snapshot
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join("")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use stationlink_device::{DeviceConfig, MainDevice};
use stationlink_frame::HeaderVariant;
use stationlink_protocol::Product;
use stationlink_transport::{TransportConfig, DEFAULT_PORT};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod monitor;
pub mod probe;
pub mod set;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect and print telemetry as it arrives.
    Monitor(MonitorArgs),
    /// Query the main unit's identity.
    Probe(ProbeArgs),
    /// Send one setting to the device.
    Set(SetArgs),
    /// Decode a captured byte stream offline.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Monitor(args) => block_on(monitor::run(args, format)),
        Command::Probe(args) => block_on(probe::run(args, format)),
        Command::Set(args) => block_on(set::run(args)),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

fn block_on<F>(future: F) -> CliResult<i32>
where
    F: Future<Output = CliResult<i32>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))?;
    runtime.block_on(future)
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Device address on the local network.
    #[arg(env = "STATIONLINK_HOST")]
    pub host: String,
    /// TCP port of the device.
    #[arg(long, env = "STATIONLINK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Product code or name (e.g. 13, "DELTA Max").
    #[arg(long, env = "STATIONLINK_PRODUCT", value_parser = parse_product, default_value = "13")]
    pub product: Product,
    /// Serial number of the main unit, used in logs.
    #[arg(long, default_value = "")]
    pub serial: String,
    /// Frame header layout.
    #[arg(long, value_enum, default_value = "v2")]
    pub header: HeaderArg,
    /// Request timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

impl ConnectArgs {
    pub fn device_config(&self) -> CliResult<DeviceConfig> {
        Ok(DeviceConfig::new(self.product, self.serial.clone())
            .with_variant(self.header.into())
            .with_request_timeout(parse_duration(&self.timeout)?))
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::new(self.host.clone()).with_port(self.port)
    }

    /// Start the device runtime. Must be called inside the runtime.
    pub fn connect(&self) -> CliResult<MainDevice> {
        Ok(MainDevice::connect(
            self.device_config()?,
            self.transport_config(),
        ))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum HeaderArg {
    V2,
    V3,
}

impl From<HeaderArg> for HeaderVariant {
    fn from(arg: HeaderArg) -> Self {
        match arg {
            HeaderArg::V2 => HeaderVariant::V2,
            HeaderArg::V3 => HeaderVariant::V3,
        }
    }
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Only print these channels (comma-separated, e.g. pd,bms).
    #[arg(long, value_delimiter = ',')]
    pub channels: Option<Vec<String>>,
    /// Exit after printing N telemetry records.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    #[command(subcommand)]
    pub setting: set::Setting,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Captured byte stream, as received from the device.
    pub file: PathBuf,
    /// Product code or name used to pick telemetry layouts.
    #[arg(long, env = "STATIONLINK_PRODUCT", value_parser = parse_product, default_value = "13")]
    pub product: Product,
    /// Frame header layout.
    #[arg(long, value_enum, default_value = "v2")]
    pub header: HeaderArg,
    /// Print frames without decoding their payloads.
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_product(input: &str) -> Result<Product, String> {
    let input = input.trim();
    if let Ok(code) = input.parse::<u8>() {
        return Ok(Product(code));
    }
    Product::KNOWN
        .into_iter()
        .find(|product| {
            product
                .name()
                .is_some_and(|name| name.eq_ignore_ascii_case(input))
        })
        .ok_or_else(|| format!("unknown product: {input}"))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

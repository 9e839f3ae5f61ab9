use clap::{Subcommand, ValueEnum};
use stationlink_protocol::{command, Command, Product};
use tracing::info;

use crate::cmd::SetArgs;
use crate::exit::{device_error, protocol_error, CliResult, SUCCESS};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    fn enabled(self) -> bool {
        self == Switch::On
    }
}

#[derive(Subcommand, Debug)]
pub enum Setting {
    /// AC outlets.
    AcOut {
        state: Switch,
        /// X-Boost.
        #[arg(long)]
        xboost: Option<Switch>,
    },
    /// 12 V outputs.
    DcOut { state: Switch },
    /// USB outputs.
    Usb { state: Switch },
    /// Buzzer.
    Beep { state: Switch },
    /// Automatic fan.
    FanAuto { state: Switch },
    /// Front light level.
    Light { level: u8 },
    /// Screen timeout in seconds and brightness.
    Lcd {
        timeout: u16,
        #[arg(long, default_value_t = 255)]
        brightness: u8,
    },
    /// Maximum charge level, percent.
    LevelMax { percent: u8 },
    /// Minimum discharge level, percent.
    LevelMin { percent: u8 },
    /// Battery level that starts a smart generator, percent.
    GenerateStart { percent: u8 },
    /// Battery level that stops a smart generator, percent.
    GenerateStop { percent: u8 },
    /// AC charging limit in watts.
    AcInLimit { watts: u16 },
    /// DC charging current in milliamps.
    DcInCurrent { milliamps: u32 },
    /// DC input type.
    DcInType { value: u8 },
    /// Standby timeout in minutes, 0 disables.
    Standby { minutes: u16 },
    /// AC output auto-off in minutes.
    AcTimeout { minutes: u16 },
    /// Power off after the given minutes.
    PowerOff { minutes: u16 },
    /// Restore factory settings.
    Reset,
}

impl Setting {
    pub fn to_command(&self, product: Product) -> stationlink_protocol::Result<Command> {
        let command = match *self {
            Setting::AcOut { state, xboost } => command::set_ac_out(
                product,
                Some(state.enabled()),
                xboost.map(Switch::enabled),
                255,
            ),
            Setting::DcOut { state } => command::set_dc_out(product, state.enabled()),
            Setting::Usb { state } => command::set_usb(product, state.enabled())?,
            Setting::Beep { state } => command::set_beep(state.enabled()),
            Setting::FanAuto { state } => command::set_fan_auto(state.enabled()),
            Setting::Light { level } => command::set_light(product, level)?,
            Setting::Lcd {
                timeout,
                brightness,
            } => command::set_lcd(product, timeout, brightness),
            Setting::LevelMax { percent } => command::set_level_max(product, percent)?,
            Setting::LevelMin { percent } => command::set_level_min(percent)?,
            Setting::GenerateStart { percent } => command::set_generate_start(percent)?,
            Setting::GenerateStop { percent } => command::set_generate_stop(percent)?,
            Setting::AcInLimit { watts } => command::set_ac_in_limit(watts, None),
            Setting::DcInCurrent { milliamps } => command::set_dc_in_current(product, milliamps),
            Setting::DcInType { value } => command::set_dc_in_type(product, value),
            Setting::Standby { minutes } => command::set_standby_timeout(minutes),
            Setting::AcTimeout { minutes } => command::set_ac_timeout(minutes),
            Setting::PowerOff { minutes } => command::close(minutes),
            Setting::Reset => command::reset(),
        };
        Ok(command)
    }
}

pub async fn run(args: SetArgs) -> CliResult<i32> {
    let product = args.connect.product;
    let command = args
        .setting
        .to_command(product)
        .map_err(|err| protocol_error("invalid setting", err))?;

    let device = args.connect.connect()?;
    let timeout = device.config().request_timeout;
    let sent = tokio::time::timeout(timeout, device.send(&command)).await;
    device.close().await;

    match sent {
        Ok(Ok(())) => {
            info!(key = %command.key, "setting sent");
            Ok(SUCCESS)
        }
        Ok(Err(err)) => Err(device_error("send failed", err)),
        Err(_) => Err(device_error(
            "send failed",
            stationlink_device::DeviceError::Timeout(timeout),
        )),
    }
}

//! Command catalog.
//!
//! Every function returns a [`Command`]: the routing key and argument bytes
//! of one outgoing frame. Encoding into wire bytes is left to the caller so
//! the same catalog serves both header variants.

use bytes::Bytes;
use stationlink_frame::{encode, HeaderVariant, RoutingKey};

use crate::error::{ProtocolError, Result};
use crate::product::Product;

/// Reply keys of the main-unit serial query. Some firmware answers from the
/// alternate PD address.
pub const SERIAL_MAIN_REPLY: [RoutingKey; 2] =
    [RoutingKey::new(2, 1, 65), RoutingKey::new(11, 1, 65)];

pub const SERIAL_EXTRA_REPLY: RoutingKey = RoutingKey::new(6, 1, 65);

/// One outgoing command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub key: RoutingKey,
    pub payload: Bytes,
}

impl Command {
    pub fn new(key: impl Into<RoutingKey>, payload: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
        }
    }

    pub fn empty(key: impl Into<RoutingKey>) -> Self {
        Self::new(key, Bytes::new())
    }

    /// Wire bytes for this command.
    pub fn encode(&self, variant: HeaderVariant) -> stationlink_frame::Result<Bytes> {
        encode(variant, self.key, &self.payload)
    }
}

/// Tri-state switch argument: unset, on, off.
fn tri(value: Option<bool>) -> u8 {
    match value {
        None => 255,
        Some(true) => 1,
        Some(false) => 0,
    }
}

fn flag(enable: bool) -> u8 {
    u8::from(enable)
}

fn percent(field: &'static str, value: u8) -> Result<u8> {
    if value > 100 {
        return Err(ProtocolError::InvalidArgument {
            field,
            reason: format!("{value} exceeds 100%"),
        });
    }
    Ok(value)
}

pub fn get_product_info(module: u8) -> Command {
    Command::empty((module, 1, 5))
}

pub fn get_cpu_id() -> Command {
    Command::empty((2, 1, 64))
}

pub fn get_serial_main() -> Command {
    Command::empty((2, 1, 65))
}

pub fn get_serial_extra() -> Command {
    Command::empty(SERIAL_EXTRA_REPLY)
}

pub fn get_pd() -> Command {
    Command::new((2, 32, 2), vec![0])
}

pub fn get_ems_main() -> Command {
    Command::empty((3, 32, 2))
}

pub fn get_ems_extra() -> Command {
    Command::empty((6, 32, 2))
}

pub fn get_inverter() -> Command {
    Command::empty((4, 32, 2))
}

pub fn reset() -> Command {
    Command::empty((2, 32, 3))
}

/// Standby timeout in minutes, 0 disables.
pub fn set_standby_timeout(minutes: u16) -> Command {
    Command::new((2, 32, 33), minutes.to_le_bytes().to_vec())
}

pub fn set_usb(product: Product, enable: bool) -> Result<Command> {
    if !product.has_usb_switch() {
        return Err(ProtocolError::Unsupported {
            command: "set_usb",
            product: product.to_string(),
        });
    }
    Ok(Command::new((2, 32, 34), vec![flag(enable)]))
}

pub fn set_light(product: Product, level: u8) -> Result<Command> {
    if !product.has_light() {
        return Err(ProtocolError::Unsupported {
            command: "set_light",
            product: product.to_string(),
        });
    }
    Ok(Command::new((2, 32, 35), vec![level]))
}

/// DC (12 V) outputs. The controlling module differs per family.
pub fn set_dc_out(product: Product, enable: bool) -> Command {
    let key = if product.is_delta() {
        (5, 32, 81)
    } else if product == Product::SMART_GENERATOR {
        (8, 8, 3)
    } else if product.is_river() {
        (2, 32, 34)
    } else {
        (2, 32, 37)
    };
    Command::new(key, vec![flag(enable)])
}

pub fn set_beep(enable: bool) -> Command {
    // The device stores "mute", not "beep".
    Command::new((2, 32, 38), vec![u8::from(!enable)])
}

/// Screen timeout in seconds plus brightness. Brightness is only sent to
/// families with a dimmable screen.
pub fn set_lcd(product: Product, timeout: u16, brightness: u8) -> Command {
    let mut arg = timeout.to_le_bytes().to_vec();
    if product.is_delta() || product.is_river_mini() {
        arg.push(brightness);
    }
    Command::new((2, 32, 39), arg)
}

pub fn get_lcd() -> Command {
    Command::empty((2, 32, 40))
}

/// Power off after `minutes`.
pub fn close(minutes: u16) -> Command {
    Command::new((2, 32, 41), minutes.to_le_bytes().to_vec())
}

pub fn set_level_max(product: Product, level: u8) -> Result<Command> {
    let module = if product == Product::RIVER_MINI { 4 } else { 3 };
    Ok(Command::new(
        (module, 32, 49),
        vec![percent("level_max", level)?],
    ))
}

pub fn set_level_min(level: u8) -> Result<Command> {
    Ok(Command::new((3, 32, 51), vec![percent("level_min", level)?]))
}

pub fn set_generate_start(level: u8) -> Result<Command> {
    Ok(Command::new(
        (3, 32, 52),
        vec![percent("generate_start", level)?],
    ))
}

pub fn set_generate_stop(level: u8) -> Result<Command> {
    Ok(Command::new(
        (3, 32, 53),
        vec![percent("generate_stop", level)?],
    ))
}

pub fn set_ac_in_slow(slow: Option<bool>) -> Command {
    Command::new((4, 32, 65), vec![tri(slow)])
}

/// AC output switch. `None` leaves a setting unchanged; a frequency of 255
/// keeps the current one.
pub fn set_ac_out(
    product: Product,
    enable: Option<bool>,
    xboost: Option<bool>,
    freq: u8,
) -> Command {
    if product == Product::SMART_GENERATOR {
        return Command::new((8, 8, 2), vec![tri(enable)]);
    }
    Command::new(
        (4, 32, 66),
        vec![tri(enable), tri(xboost), 255, 255, 255, 255, freq],
    )
}

pub fn set_dc_in_type(product: Product, value: u8) -> Command {
    let key = if product.is_delta() {
        (5, 32, 82)
    } else {
        (4, 32, 67)
    };
    Command::new(key, vec![value])
}

pub fn get_dc_in_type(product: Product) -> Command {
    let key = if product.is_delta() {
        (5, 32, 82)
    } else {
        (4, 32, 68)
    };
    Command::new(key, vec![0])
}

/// AC charging limit in watts. 0xFFFF keeps the current limit.
pub fn set_ac_in_limit(watts: u16, pause: Option<bool>) -> Command {
    let mut arg = vec![255, 255];
    arg.extend_from_slice(&watts.to_le_bytes());
    arg.push(tri(pause));
    Command::new((4, 32, 69), arg)
}

fn dc_in_module(product: Product) -> u8 {
    if product.is_delta() {
        5
    } else {
        4
    }
}

/// DC charging current in milliamps.
pub fn set_dc_in_current(product: Product, milliamps: u32) -> Command {
    Command::new(
        (dc_in_module(product), 32, 71),
        milliamps.to_le_bytes().to_vec(),
    )
}

pub fn get_dc_in_current(product: Product) -> Command {
    Command::empty((dc_in_module(product), 32, 72))
}

pub fn set_fan_auto(enable: bool) -> Command {
    Command::new((4, 32, 73), vec![if enable { 1 } else { 3 }])
}

pub fn get_fan_auto() -> Command {
    Command::empty((4, 32, 74))
}

pub fn get_lab() -> Command {
    Command::empty((4, 32, 84))
}

pub fn set_lab(value: u8) -> Command {
    Command::new((4, 32, 84), vec![value])
}

/// AC output auto-off in minutes.
pub fn set_ac_timeout(minutes: u16) -> Command {
    Command::new((4, 32, 153), minutes.to_le_bytes().to_vec())
}

/// Ambient light strip on the extra battery. 255 in any position keeps the
/// current setting.
pub fn set_ambient(mode: u8, animate: u8, color: [u8; 4], brightness: u8) -> Command {
    let mut arg = vec![mode, animate];
    arg.extend_from_slice(&color);
    arg.push(brightness);
    Command::new((6, 32, 97), arg)
}

#[cfg(test)]
mod tests {
    use stationlink_frame::decode_frame;

    use super::*;

    #[test]
    fn encodes_known_wire_bytes() {
        let wire = get_serial_main().encode(HeaderVariant::V2).unwrap();
        assert_eq!(&wire[..2], &[0xaa, 0x02]);
        assert_eq!(&wire[12..16], &[0x20, 2, 1, 65]);
        assert_eq!(wire.len(), 18);
    }

    #[test]
    fn encoded_command_decodes_back() {
        let cmd = set_ac_in_limit(800, Some(false));
        let frame = decode_frame(&cmd.encode(HeaderVariant::V3).unwrap()).unwrap();
        assert_eq!(frame.key, RoutingKey::new(4, 32, 69));
        assert_eq!(&frame.payload[..], &[255, 255, 0x20, 0x03, 0]);
    }

    #[test]
    fn dc_out_routes_per_family() {
        assert_eq!(set_dc_out(Product::DELTA_MAX, true).key, RoutingKey::new(5, 32, 81));
        assert_eq!(
            set_dc_out(Product::SMART_GENERATOR, true).key,
            RoutingKey::new(8, 8, 3)
        );
        assert_eq!(set_dc_out(Product::RIVER, false).key, RoutingKey::new(2, 32, 34));
        assert_eq!(set_dc_out(Product::RIVER_MINI, true).key, RoutingKey::new(2, 32, 37));
        assert_eq!(&set_dc_out(Product::RIVER, false).payload[..], &[0]);
    }

    #[test]
    fn ac_out_arguments() {
        let cmd = set_ac_out(Product::DELTA_PRO, Some(true), None, 50);
        assert_eq!(cmd.key, RoutingKey::new(4, 32, 66));
        assert_eq!(&cmd.payload[..], &[1, 255, 255, 255, 255, 255, 50]);

        let cmd = set_ac_out(Product::SMART_GENERATOR, Some(false), Some(true), 60);
        assert_eq!(cmd.key, RoutingKey::new(8, 8, 2));
        assert_eq!(&cmd.payload[..], &[0]);
    }

    #[test]
    fn lcd_brightness_only_where_supported() {
        assert_eq!(&set_lcd(Product::DELTA_MAX, 300, 80).payload[..], &[0x2c, 0x01, 80]);
        assert_eq!(&set_lcd(Product::RIVER, 300, 80).payload[..], &[0x2c, 0x01]);
    }

    #[test]
    fn product_dependent_modules() {
        assert_eq!(set_level_max(Product::RIVER_MINI, 90).unwrap().key.dest, 4);
        assert_eq!(set_level_max(Product::RIVER, 90).unwrap().key.dest, 3);
        assert_eq!(get_dc_in_current(Product::DELTA_MINI).key, RoutingKey::new(5, 32, 72));
        assert_eq!(get_dc_in_current(Product::RIVER).key, RoutingKey::new(4, 32, 72));
        assert_eq!(get_dc_in_type(Product::DELTA_PRO).key, RoutingKey::new(5, 32, 82));
        assert_eq!(set_dc_in_type(Product::RIVER, 1).key, RoutingKey::new(4, 32, 67));
        assert_eq!(
            &set_dc_in_current(Product::RIVER, 8000).payload[..],
            &8000u32.to_le_bytes()
        );
    }

    #[test]
    fn boolean_encodings() {
        assert_eq!(&set_beep(true).payload[..], &[0]);
        assert_eq!(&set_beep(false).payload[..], &[1]);
        assert_eq!(&set_fan_auto(true).payload[..], &[1]);
        assert_eq!(&set_fan_auto(false).payload[..], &[3]);
        assert_eq!(&set_ac_in_slow(None).payload[..], &[255]);
    }

    #[test]
    fn rejects_unsupported_and_out_of_range() {
        assert!(matches!(
            set_light(Product::DELTA_MAX, 1),
            Err(ProtocolError::Unsupported { command: "set_light", .. })
        ));
        assert!(matches!(
            set_usb(Product::RIVER, true),
            Err(ProtocolError::Unsupported { .. })
        ));
        assert!(set_usb(Product::RIVER_MINI, true).is_ok());
        assert!(matches!(
            set_level_min(101),
            Err(ProtocolError::InvalidArgument { field: "level_min", .. })
        ));
    }

    #[test]
    fn ambient_layout() {
        let cmd = set_ambient(1, 2, [10, 20, 30, 40], 200);
        assert_eq!(cmd.key, RoutingKey::new(6, 32, 97));
        assert_eq!(&cmd.payload[..], &[1, 2, 10, 20, 30, 40, 200]);
    }
}

use serde::Serialize;
use stationlink_frame::RoutingKey;
use tracing::trace;

use crate::error::{ProtocolError, Result};
use crate::layout::{le_uint, parse_fields};
use crate::product::{Product, ProductFamily};
use crate::tables;
use crate::value::Snapshot;

/// Telemetry and reply channels, classified by routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Power-delivery board statistics.
    Pd,
    /// Aggregate battery management statistics.
    Ems,
    Inverter,
    Mppt,
    /// Per-pack battery statistics.
    Bms,
    DcInCurrent,
    DcInType,
    FanAuto,
    LcdTimeout,
    /// Identity record of the main unit.
    SerialMain,
    /// Identity record of a secondary pack.
    SerialExtra,
}

impl ChannelKind {
    pub const ALL: [Self; 11] = [
        Self::Pd,
        Self::Ems,
        Self::Inverter,
        Self::Mppt,
        Self::Bms,
        Self::DcInCurrent,
        Self::DcInType,
        Self::FanAuto,
        Self::LcdTimeout,
        Self::SerialMain,
        Self::SerialExtra,
    ];

    pub fn classify(key: RoutingKey) -> Option<Self> {
        let kind = match key.as_tuple() {
            (2, 32, 2) => Self::Pd,
            (3, 32, 2) => Self::Ems,
            (4, 32, 2) => Self::Inverter,
            (5, 32, 2) => Self::Mppt,
            (3, 32, 50) | (6, 32, 2) | (6, 32, 50) => Self::Bms,
            (4, 32, 72) | (5, 32, 72) => Self::DcInCurrent,
            (4, 32, 68) | (5, 32, 82) => Self::DcInType,
            (4, 32, 74) => Self::FanAuto,
            (2, 32, 40) => Self::LcdTimeout,
            (2 | 11, 1, 65) => Self::SerialMain,
            (6, 1, 65) => Self::SerialExtra,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Pd => "pd",
            Self::Ems => "ems",
            Self::Inverter => "inverter",
            Self::Mppt => "mppt",
            Self::Bms => "bms",
            Self::DcInCurrent => "dc_in_current",
            Self::DcInType => "dc_in_type",
            Self::FanAuto => "fan_auto",
            Self::LcdTimeout => "lcd_timeout",
            Self::SerialMain => "serial_main",
            Self::SerialExtra => "serial_extra",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// Identity record returned by a serial-number query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerialInfo {
    pub checksum: u32,
    pub product: Product,
    pub product_detail: u8,
    pub model: u8,
    pub serial: String,
    pub cpu_id: String,
}

const SERIAL_LEN: usize = 23;

pub fn parse_serial(payload: &[u8]) -> Result<SerialInfo> {
    if payload.len() < SERIAL_LEN {
        return Err(ProtocolError::Truncated {
            record: "serial",
            need: SERIAL_LEN,
            got: payload.len(),
        });
    }

    let serial = text_field("serial", &payload[8..SERIAL_LEN])?;
    // An undecodable cpu id does not invalidate the serial.
    let cpu_id = payload
        .get(SERIAL_LEN + 1..)
        .and_then(|rest| text_field("cpu_id", &rest[..rest.len().min(12)]).ok())
        .unwrap_or_default();

    Ok(SerialInfo {
        checksum: le_uint(&payload[..4]) as u32,
        product: Product(payload[4]),
        product_detail: payload[6],
        model: payload[7],
        serial,
        cpu_id,
    })
}

fn text_field(field: &'static str, bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(|s| s.trim_end_matches('\0').to_string())
        .map_err(|_| ProtocolError::InvalidText { field })
}

pub fn parse_pd(payload: &[u8], product: Product) -> Snapshot {
    match product.family() {
        ProductFamily::Delta => parse_fields(payload, tables::PD_DELTA),
        ProductFamily::River => parse_fields(payload, tables::PD_RIVER),
        ProductFamily::RiverMini => parse_fields(payload, tables::PD_RIVER_MINI),
        family => unsupported("pd", family),
    }
}

pub fn parse_ems(payload: &[u8], product: Product) -> Snapshot {
    match product.family() {
        ProductFamily::Delta => parse_fields(payload, tables::EMS_DELTA),
        ProductFamily::River => parse_fields(payload, tables::EMS_RIVER),
        family => unsupported("ems", family),
    }
}

pub fn parse_inverter(payload: &[u8], product: Product) -> Snapshot {
    match product.family() {
        ProductFamily::Delta => parse_fields(payload, tables::INVERTER_DELTA),
        ProductFamily::River => parse_fields(payload, tables::INVERTER_RIVER),
        ProductFamily::RiverMini => parse_fields(payload, tables::INVERTER_RIVER_MINI),
        family => unsupported("inverter", family),
    }
}

pub fn parse_mppt(payload: &[u8], product: Product) -> Snapshot {
    match product.family() {
        ProductFamily::Delta => parse_fields(payload, tables::MPPT_DELTA),
        family => unsupported("mppt", family),
    }
}

/// Per-pack battery statistics with the pack index they describe.
///
/// Delta records lead with the pack index. River records always describe
/// the extra battery, pack 1.
pub fn parse_bms(payload: &[u8], product: Product) -> (u8, Snapshot) {
    match product.family() {
        ProductFamily::Delta => {
            let mut snapshot = parse_fields(payload, tables::BMS_DELTA);
            let pack = snapshot
                .remove("num")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u8;
            (pack, snapshot)
        }
        ProductFamily::River => (1, parse_fields(payload, tables::BMS_RIVER)),
        family => (0, unsupported("bms", family)),
    }
}

fn unsupported(channel: &'static str, family: ProductFamily) -> Snapshot {
    trace!(channel, ?family, "no layout for product family");
    Snapshot::new()
}

fn require(record: &'static str, payload: &[u8], need: usize) -> Result<()> {
    if payload.len() < need {
        return Err(ProtocolError::Truncated {
            record,
            need,
            got: payload.len(),
        });
    }
    Ok(())
}

/// Configured DC input current limit, in milliamps.
pub fn parse_dc_in_current(payload: &[u8]) -> Result<u32> {
    require("dc_in_current", payload, 4)?;
    Ok(le_uint(&payload[..4]) as u32)
}

pub fn parse_dc_in_type(payload: &[u8]) -> Result<u8> {
    require("dc_in_type", payload, 2)?;
    Ok(payload[1])
}

pub fn parse_fan_auto(payload: &[u8]) -> Result<bool> {
    require("fan_auto", payload, 1)?;
    Ok(payload[0] == 1)
}

/// Screen timeout in seconds.
pub fn parse_lcd_timeout(payload: &[u8]) -> Result<u16> {
    require("lcd_timeout", payload, 3)?;
    Ok(u16::from_le_bytes([payload[1], payload[2]]))
}

//! Telemetry multiplexer.
//!
//! Routes decoded frames into per-kind [`Channel`]s. The routing key picks
//! the channel, the product picks the payload layout.

use std::sync::Arc;
use std::time::Duration;

use stationlink_frame::Frame;
use stationlink_protocol::parse::{self, ChannelKind};
use stationlink_protocol::{FieldValue, Product, Snapshot};
use tracing::debug;

use crate::channel::Channel;

/// What [`Telemetry::route`] did with a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Pd(Arc<Snapshot>),
    Ems(Arc<Snapshot>),
    Inverter(Arc<Snapshot>),
    Mppt(Arc<Snapshot>),
    /// Per-pack battery statistics. Only pack 0 is published here; other
    /// packs belong to secondary devices.
    Bms { pack: u8, snapshot: Arc<Snapshot> },
    /// A single-field configuration channel was updated.
    Setting { kind: ChannelKind, value: FieldValue },
    /// Identity replies and frames with unknown or malformed payloads.
    Ignored,
}

pub struct Telemetry {
    product: Product,
    pd: Channel<Arc<Snapshot>>,
    ems: Channel<Arc<Snapshot>>,
    inverter: Channel<Arc<Snapshot>>,
    mppt: Channel<Arc<Snapshot>>,
    bms: Channel<Arc<Snapshot>>,
    dc_in_current: Channel<u32>,
    dc_in_type: Channel<u8>,
    fan_auto: Channel<bool>,
    lcd_timeout: Channel<u16>,
}

impl Telemetry {
    pub fn new(product: Product, capacity: usize, freshness: Duration) -> Self {
        Self {
            product,
            pd: Channel::new("pd", capacity, freshness),
            ems: Channel::new("ems", capacity, freshness),
            inverter: Channel::new("inverter", capacity, freshness),
            mppt: Channel::new("mppt", capacity, freshness),
            bms: Channel::new("bms", capacity, freshness),
            dc_in_current: Channel::new("dc_in_current", capacity, freshness),
            dc_in_type: Channel::new("dc_in_type", capacity, freshness),
            fan_auto: Channel::new("fan_auto", capacity, freshness),
            lcd_timeout: Channel::new("lcd_timeout", capacity, freshness),
        }
    }

    pub fn product(&self) -> Product {
        self.product
    }

    pub fn pd(&self) -> &Channel<Arc<Snapshot>> {
        &self.pd
    }

    pub fn ems(&self) -> &Channel<Arc<Snapshot>> {
        &self.ems
    }

    pub fn inverter(&self) -> &Channel<Arc<Snapshot>> {
        &self.inverter
    }

    pub fn mppt(&self) -> &Channel<Arc<Snapshot>> {
        &self.mppt
    }

    /// Primary pack battery statistics.
    pub fn bms(&self) -> &Channel<Arc<Snapshot>> {
        &self.bms
    }

    /// DC input current limit, milliamps.
    pub fn dc_in_current(&self) -> &Channel<u32> {
        &self.dc_in_current
    }

    pub fn dc_in_type(&self) -> &Channel<u8> {
        &self.dc_in_type
    }

    pub fn fan_auto(&self) -> &Channel<bool> {
        &self.fan_auto
    }

    /// Screen timeout, seconds.
    pub fn lcd_timeout(&self) -> &Channel<u16> {
        &self.lcd_timeout
    }

    /// Snapshot channel for a table-backed kind.
    pub fn snapshots(&self, kind: ChannelKind) -> Option<&Channel<Arc<Snapshot>>> {
        match kind {
            ChannelKind::Pd => Some(&self.pd),
            ChannelKind::Ems => Some(&self.ems),
            ChannelKind::Inverter => Some(&self.inverter),
            ChannelKind::Mppt => Some(&self.mppt),
            ChannelKind::Bms => Some(&self.bms),
            _ => None,
        }
    }

    /// Classify `frame`, parse it, and publish the result.
    pub fn route(&self, frame: &Frame) -> Routed {
        let Some(kind) = ChannelKind::classify(frame.key) else {
            return Routed::Ignored;
        };
        let payload = &frame.payload[..];

        match kind {
            ChannelKind::Pd => {
                let snapshot = Arc::new(parse::parse_pd(payload, self.product));
                self.pd.publish(Arc::clone(&snapshot));
                Routed::Pd(snapshot)
            }
            ChannelKind::Ems => {
                let snapshot = Arc::new(parse::parse_ems(payload, self.product));
                self.ems.publish(Arc::clone(&snapshot));
                Routed::Ems(snapshot)
            }
            ChannelKind::Inverter => {
                let snapshot = Arc::new(parse::parse_inverter(payload, self.product));
                self.inverter.publish(Arc::clone(&snapshot));
                Routed::Inverter(snapshot)
            }
            ChannelKind::Mppt => {
                let snapshot = Arc::new(parse::parse_mppt(payload, self.product));
                self.mppt.publish(Arc::clone(&snapshot));
                Routed::Mppt(snapshot)
            }
            ChannelKind::Bms => {
                let (pack, snapshot) = parse::parse_bms(payload, self.product);
                let snapshot = Arc::new(snapshot);
                if pack == 0 {
                    self.bms.publish(Arc::clone(&snapshot));
                }
                Routed::Bms { pack, snapshot }
            }
            ChannelKind::DcInCurrent => {
                Self::setting(kind, parse::parse_dc_in_current(payload), &self.dc_in_current)
            }
            ChannelKind::DcInType => {
                Self::setting(kind, parse::parse_dc_in_type(payload), &self.dc_in_type)
            }
            ChannelKind::FanAuto => {
                Self::setting(kind, parse::parse_fan_auto(payload), &self.fan_auto)
            }
            ChannelKind::LcdTimeout => {
                Self::setting(kind, parse::parse_lcd_timeout(payload), &self.lcd_timeout)
            }
            ChannelKind::SerialMain | ChannelKind::SerialExtra => Routed::Ignored,
        }
    }

    fn setting<T: Clone + Into<u64>>(
        kind: ChannelKind,
        parsed: stationlink_protocol::Result<T>,
        channel: &Channel<T>,
    ) -> Routed {
        match parsed {
            Ok(value) => {
                channel.publish(value.clone());
                Routed::Setting {
                    kind,
                    value: FieldValue::Int(value.into()),
                }
            }
            Err(err) => {
                debug!(channel = kind.name(), %err, "dropping malformed setting");
                Routed::Ignored
            }
        }
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Product code reported by the appliance and configured by the user.
///
/// Unknown codes are representable; they map to [`ProductFamily::Unknown`]
/// and parse every telemetry channel as an empty snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Product(pub u8);

/// Product families sharing a payload layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductFamily {
    River,
    Delta,
    RiverMini,
    SmartGenerator,
    Unknown,
}

impl Product {
    pub const RIVER: Self = Self(5);
    pub const RIVER_600_PRO: Self = Self(7);
    pub const RIVER_PRO: Self = Self(12);
    pub const DELTA_MAX: Self = Self(13);
    pub const DELTA_PRO: Self = Self(14);
    pub const DELTA_MINI: Self = Self(15);
    pub const RIVER_MINI: Self = Self(17);
    pub const RIVER_PLUS: Self = Self(18);
    pub const SMART_GENERATOR: Self = Self(20);

    /// Every product code with a known name.
    pub const KNOWN: [Self; 9] = [
        Self::RIVER,
        Self::RIVER_600_PRO,
        Self::RIVER_PRO,
        Self::DELTA_MAX,
        Self::DELTA_PRO,
        Self::DELTA_MINI,
        Self::RIVER_MINI,
        Self::RIVER_PLUS,
        Self::SMART_GENERATOR,
    ];

    pub const fn code(self) -> u8 {
        self.0
    }

    pub const fn family(self) -> ProductFamily {
        match self.0 {
            5 | 7 | 12 | 18 => ProductFamily::River,
            13..=15 => ProductFamily::Delta,
            17 => ProductFamily::RiverMini,
            20 => ProductFamily::SmartGenerator,
            _ => ProductFamily::Unknown,
        }
    }

    pub const fn is_delta(self) -> bool {
        matches!(self.family(), ProductFamily::Delta)
    }

    pub const fn is_river(self) -> bool {
        matches!(self.family(), ProductFamily::River)
    }

    pub const fn is_river_mini(self) -> bool {
        matches!(self.family(), ProductFamily::RiverMini)
    }

    /// Marketing name, if the code is known.
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            5 => Some("RIVER"),
            7 => Some("RIVER 600 Pro"),
            12 => Some("RIVER Pro"),
            13 => Some("DELTA Max"),
            14 => Some("DELTA Pro"),
            15 => Some("DELTA Mini"),
            17 => Some("RIVER Mini"),
            18 => Some("RIVER Plus"),
            20 => Some("Smart Generator"),
            _ => None,
        }
    }

    /// Whether the given hardware model ships with an extra battery.
    ///
    /// Only RIVER and RIVER Pro encode this in their model byte (model 2).
    /// `None` means the answer is unknown for this product.
    pub fn has_extra_battery(self, model: Option<u64>) -> Option<bool> {
        match self {
            Self::RIVER | Self::RIVER_PRO => Some(model == Some(2)),
            _ => None,
        }
    }

    pub const fn has_light(self) -> bool {
        self.is_river()
    }

    /// Whether USB outputs can be switched separately from DC outputs.
    pub const fn has_usb_switch(self) -> bool {
        !matches!(self.0, 5 | 7 | 12 | 14 | 15 | 18)
    }

    /// Whether a secondary pack answers its own serial query, so extra
    /// battery packs can be discovered from telemetry.
    pub const fn discovers_secondary_packs(self) -> bool {
        self.is_river()
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "product {}", self.0),
        }
    }
}

impl From<u8> for Product {
    fn from(code: u8) -> Self {
        Self(code)
    }
}

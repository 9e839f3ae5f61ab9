//! Routing keys.
//!
//! A routing key is the (module, command set, command id) triple carried by
//! every frame. It names both the intent of an outgoing command and the
//! classification of an inbound frame. The same key can carry different
//! payload layouts depending on the product, so keys are not globally unique.

use std::fmt;

use serde::Serialize;

/// Power-delivery board.
pub const MODULE_PD: u8 = 2;
/// Battery management (main pack / EMS).
pub const MODULE_BMS: u8 = 3;
/// Inverter.
pub const MODULE_INVERTER: u8 = 4;
/// MPPT / DC-DC board.
pub const MODULE_MPPT: u8 = 5;
/// Secondary ("extra") battery pack.
pub const MODULE_EXTRA_BATTERY: u8 = 6;
/// Smart generator controller.
pub const MODULE_GENERATOR: u8 = 8;
/// Alternate PD address used by some firmware when answering identity queries.
pub const MODULE_PD_ALT: u8 = 11;

/// (module, command set, command id) triple identifying a frame's channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RoutingKey {
    /// Device module the frame is addressed to or sent from.
    pub dest: u8,
    pub command_set: u8,
    pub command_id: u8,
}

impl RoutingKey {
    pub const fn new(dest: u8, command_set: u8, command_id: u8) -> Self {
        Self {
            dest,
            command_set,
            command_id,
        }
    }

    /// The key as a plain tuple.
    pub const fn as_tuple(self) -> (u8, u8, u8) {
        (self.dest, self.command_set, self.command_id)
    }
}

impl From<(u8, u8, u8)> for RoutingKey {
    fn from((dest, command_set, command_id): (u8, u8, u8)) -> Self {
        Self::new(dest, command_set, command_id)
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.dest, self.command_set, self.command_id)
    }
}

/// Returns a human-readable name for a module address.
pub fn module_name(module: u8) -> &'static str {
    match module {
        MODULE_PD | MODULE_PD_ALT => "PD",
        MODULE_BMS => "BMS",
        MODULE_INVERTER => "INVERTER",
        MODULE_MPPT => "MPPT",
        MODULE_EXTRA_BATTERY => "EXTRA_BATTERY",
        MODULE_GENERATOR => "GENERATOR",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_tuple() {
        let key = RoutingKey::new(2, 32, 2);
        assert_eq!(key.to_string(), "2:32:2");
        assert_eq!(key.as_tuple(), (2, 32, 2));
        assert_eq!(RoutingKey::from((2, 32, 2)), key);
    }

    #[test]
    fn module_names() {
        assert_eq!(module_name(2), "PD");
        assert_eq!(module_name(11), "PD");
        assert_eq!(module_name(6), "EXTRA_BATTERY");
        assert_eq!(module_name(99), "UNKNOWN");
    }
}

//! Telemetry record layouts per product family.

use crate::layout::Field;

pub const PD_DELTA: &[Field] = &[
    Field::int("model", 1),
    Field::int("pd_error", 4),
    Field::version("pd_version"),
    Field::version("wifi_version"),
    Field::int("wifi_autorecovery", 1),
    Field::int("battery_level", 1),
    Field::int("out_power", 2),
    Field::int("in_power", 2),
    Field::minutes("remain_display"),
    Field::int("beep", 1),
    Field::int("anderson_out_power", 1),
    Field::int("usb_out1_power", 1),
    Field::int("usb_out2_power", 1),
    Field::int("usbqc_out1_power", 1),
    Field::int("usbqc_out2_power", 1),
    Field::int("typec_out1_power", 1),
    Field::int("typec_out2_power", 1),
    Field::int("typec_out1_temp", 1),
    Field::int("typec_out2_temp", 1),
    Field::int("car_out_state", 1),
    Field::int("car_out_power", 1),
    Field::int("car_out_temp", 1),
    Field::int("standby_timeout", 2),
    Field::int("lcd_timeout", 2),
    Field::int("lcd_brightness", 1),
    Field::int("car_in_energy", 4),
    Field::int("mppt_in_energy", 4),
    Field::int("ac_in_energy", 4),
    Field::int("dc_out_energy", 4),
    Field::int("ac_out_energy", 4),
    Field::seconds("usb_time"),
    Field::seconds("typec_time"),
    Field::seconds("car_out_time"),
    Field::seconds("ac_out_time"),
    Field::seconds("ac_in_time"),
    Field::seconds("car_in_time"),
    Field::seconds("mppt_time"),
    Field::skip(2),
    Field::int("ext_rj45", 1),
    Field::int("ext_infinity", 1),
];

pub const PD_RIVER: &[Field] = &[
    Field::int("model", 1),
    Field::int("pd_error", 4),
    Field::version("pd_version"),
    Field::int("battery_level", 1),
    Field::int("out_power", 2),
    Field::int("in_power", 2),
    Field::minutes("remain_display"),
    Field::int("car_out_state", 1),
    Field::int("light_state", 1),
    Field::int("beep", 1),
    Field::int("typec_out1_power", 1),
    Field::int("usb_out1_power", 1),
    Field::int("usb_out2_power", 1),
    Field::int("usbqc_out1_power", 1),
    Field::int("car_out_power", 1),
    Field::int("light_power", 1),
    Field::int("typec_out1_temp", 1),
    Field::int("car_out_temp", 1),
    Field::int("standby_timeout", 2),
    Field::int("car_in_energy", 4),
    Field::int("mppt_in_energy", 4),
    Field::int("ac_in_energy", 4),
    Field::int("dc_out_energy", 4),
    Field::int("ac_out_energy", 4),
    Field::seconds("usb_time"),
    Field::seconds("usbqc_time"),
    Field::seconds("typec_time"),
    Field::seconds("car_out_time"),
    Field::seconds("ac_out_time"),
    Field::seconds("car_in_time"),
    Field::seconds("mppt_time"),
];

pub const PD_RIVER_MINI: &[Field] = &[
    Field::int("model", 1),
    Field::int("pd_error", 4),
    Field::version("pd_version"),
    Field::version("wifi_version"),
    Field::int("wifi_autorecovery", 1),
    Field::int("battery_level", 1),
    Field::int("out_power", 2),
    Field::int("in_power", 2),
    Field::minutes("remain_display"),
    Field::int("beep", 1),
    Field::int("usb_out1_state", 1),
    Field::int("usb_out1_power", 1),
    Field::int("usb_out2_power", 1),
    Field::int("usbqc_out1_power", 1),
    Field::int("usbqc_out2_power", 1),
    Field::int("typec_out1_power", 1),
    Field::int("typec_out2_power", 1),
    Field::int("typec_out1_temp", 1),
    Field::int("typec_out2_temp", 1),
    Field::int("car_out_state", 1),
    Field::int("car_out_power", 1),
    Field::int("car_out_temp", 1),
    Field::int("standby_timeout", 1),
    Field::hex("unknown_1", 1),
    Field::int("lcd_timeout", 2),
    Field::int("lcd_brightness", 1),
    Field::int("car_in_energy", 4),
    Field::int("mppt_in_energy", 4),
    Field::int("ac_in_energy", 4),
    Field::int("dc_out_energy", 4),
    Field::int("ac_out_energy", 4),
    Field::seconds("usb_time"),
    Field::hex("unknown_2", 8),
    Field::seconds("car_out_time"),
    Field::seconds("ac_out_time"),
    Field::seconds("car_in_time"),
    Field::seconds("mppt_time"),
    Field::hex("unknown_3", 30),
];

pub const EMS_DELTA: &[Field] = &[
    Field::int("state_charge", 1),
    Field::int("chg_cmd", 1),
    Field::int("dsg_cmd", 1),
    Field::scaled("battery_main_voltage", 4, 1000),
    Field::scaled("battery_main_current", 4, 1000),
    Field::int("fan_level", 1),
    Field::int("battery_level_max", 1),
    Field::int("model", 1),
    Field::int("battery_main_level", 1),
    Field::int("flag_open_ups", 1),
    Field::int("battery_main_warning", 1),
    Field::minutes("battery_remain_charge"),
    Field::minutes("battery_remain_discharge"),
    Field::int("battery_main_normal", 1),
    Field::float("battery_main_level_f32"),
    Field::int("is_connect", 3),
    Field::int("max_available_num", 1),
    Field::int("open_bms_idx", 1),
    Field::scaled("battery_main_voltage_min", 4, 1000),
    Field::scaled("battery_main_voltage_max", 4, 1000),
    Field::int("battery_level_min", 1),
    Field::int("generator_level_start", 1),
    Field::int("generator_level_stop", 1),
];

pub const EMS_RIVER: &[Field] = &[
    Field::int("battery_main_error", 4),
    Field::version("battery_main_version"),
    Field::int("battery_main_level", 1),
    Field::scaled("battery_main_voltage", 4, 1000),
    Field::int("battery_main_current", 4),
    Field::int("battery_main_temp", 1),
    Field::int("open_bms_idx", 1),
    Field::int("battery_capacity_remain", 4),
    Field::int("battery_capacity_full", 4),
    Field::int("battery_cycles", 4),
    Field::int("battery_level_max", 1),
    Field::scaled("battery_main_voltage_max", 2, 1000),
    Field::scaled("battery_main_voltage_min", 2, 1000),
    Field::int("battery_main_temp_max", 1),
    Field::int("battery_main_temp_min", 1),
    Field::int("mos_temp_max", 1),
    Field::int("mos_temp_min", 1),
    Field::int("battery_main_fault", 1),
    Field::int("bq_sys_stat_reg", 1),
    Field::int("tag_chg_amp", 4),
];

pub const INVERTER_DELTA: &[Field] = &[
    Field::int("ac_error", 4),
    Field::version("ac_version"),
    Field::int("ac_in_type", 1),
    Field::int("ac_in_power", 2),
    Field::int("ac_out_power", 2),
    Field::int("ac_type", 1),
    Field::scaled("ac_out_voltage", 4, 1000),
    Field::scaled("ac_out_current", 4, 1000),
    Field::int("ac_out_freq", 1),
    Field::scaled("ac_in_voltage", 4, 1000),
    Field::scaled("ac_in_current", 4, 1000),
    Field::int("ac_in_freq", 1),
    Field::int("ac_out_temp", 2),
    Field::int("dc_in_voltage", 4),
    Field::int("dc_in_current", 4),
    Field::int("ac_in_temp", 2),
    Field::int("fan_state", 1),
    Field::int("ac_out_state", 1),
    Field::int("ac_out_xboost", 1),
    Field::scaled("ac_out_voltage_config", 4, 1000),
    Field::int("ac_out_freq_config", 1),
    Field::int("fan_config", 1),
    Field::int("ac_in_pause", 1),
    Field::int("ac_in_limit_switch", 1),
    Field::int("ac_in_limit_max", 2),
    Field::int("ac_in_limit_custom", 2),
    Field::int("ac_out_timeout", 2),
];

pub const INVERTER_RIVER: &[Field] = &[
    Field::int("ac_error", 4),
    Field::version("ac_version"),
    Field::int("in_type", 1),
    Field::int("in_power", 2),
    Field::int("ac_out_power", 2),
    Field::int("ac_type", 1),
    Field::scaled("ac_out_voltage", 4, 1000),
    Field::scaled("ac_out_current", 4, 1000),
    Field::int("ac_out_freq", 1),
    Field::scaled("ac_in_voltage", 4, 1000),
    Field::scaled("ac_in_current", 4, 1000),
    Field::int("ac_in_freq", 1),
    Field::int("ac_out_temp", 1),
    Field::scaled("dc_in_voltage", 4, 1000),
    Field::scaled("dc_in_current", 4, 1000),
    Field::int("ac_in_temp", 1),
    Field::int("fan_state", 1),
    Field::int("ac_out_state", 1),
    Field::int("ac_out_xboost", 1),
    Field::scaled("ac_out_voltage_config", 4, 1000),
    Field::int("ac_out_freq_config", 1),
    Field::int("ac_in_slow", 1),
    Field::int("ac_out_timeout", 2),
    Field::int("fan_config", 1),
];

pub const INVERTER_RIVER_MINI: &[Field] = &[
    Field::int("ac_error", 4),
    Field::version("ac_version"),
    Field::int("in_type", 1),
    Field::int("in_power", 2),
    Field::int("ac_out_power", 2),
    Field::int("ac_type", 1),
    Field::scaled("ac_out_voltage", 4, 1000),
    Field::scaled("ac_out_current", 4, 1000),
    Field::int("ac_out_freq", 1),
    Field::scaled("ac_in_voltage", 4, 1000),
    Field::scaled("ac_in_current", 4, 1000),
    Field::int("ac_in_freq", 1),
    Field::int("ac_out_temp", 1),
    Field::scaled("dc_in_voltage", 4, 1000),
    Field::scaled("dc_in_current", 4, 1000),
    Field::int("ac_in_temp", 1),
    Field::int("fan_state", 1),
    Field::int("ac_out_state", 1),
    Field::int("ac_out_xboost", 1),
    Field::scaled("ac_out_voltage_config", 4, 1000),
    Field::int("ac_out_freq_config", 1),
    Field::int("ac_in_slow", 1),
    Field::int("battery_main_level", 1),
    Field::scaled("battery_main_voltage", 4, 1000),
    Field::int("battery_current", 4),
    Field::int("battery_main_temp", 1),
    Field::int("open_bms_idx", 1),
    Field::int("battery_capacity_remain", 4),
    Field::int("battery_capacity_full", 4),
    Field::int("battery_cycles", 4),
    Field::int("battery_level_max", 1),
    Field::float("battery_main_level_f32"),
    Field::int("ac_out_timeout", 2),
];

pub const MPPT_DELTA: &[Field] = &[
    Field::int("dc_in_error", 4),
    Field::version("dc_in_version"),
    Field::scaled("dc_in_voltage", 4, 10),
    Field::scaled("dc_in_current", 4, 100),
    Field::scaled("dc_in_power", 2, 10),
    Field::int("dcdc_out_voltage", 4),
    Field::int("dcdc_out_current", 4),
    Field::int("dcdc_out_power", 2),
    Field::int("dc_in_temp", 2),
    Field::int("dc_in_type", 1),
    Field::int("dc_in_type_config", 1),
    Field::int("dc_in_type_detected", 1),
    Field::int("dc_in_state", 1),
    Field::int("anderson_out_voltage", 4),
    Field::int("anderson_out_current", 4),
    Field::int("anderson_out_power", 2),
    Field::scaled("car_out_voltage", 4, 10),
    Field::scaled("car_out_current", 4, 100),
    Field::scaled("car_out_power", 2, 10),
    Field::int("car_out_temp", 2),
    Field::int("car_out_state", 1),
    Field::int("dc24_temp", 2),
    Field::int("dc24_state", 1),
    Field::int("dc_in_pause", 1),
    Field::int("dc_in_switch", 1),
    Field::int("dc_in_limit_max", 2),
    Field::int("dc_in_limit_custom", 2),
];

/// Per-pack battery record on Delta products. The leading byte is the pack
/// index and is split off before the snapshot is published.
pub const BMS_DELTA: &[Field] = &[
    Field::int("num", 1),
    Field::int("battery_type", 1),
    Field::int("battery_cell_id", 1),
    Field::int("battery_error", 4),
    Field::version("battery_version"),
    Field::int("battery_level", 1),
    Field::scaled("battery_voltage", 4, 1000),
    Field::int("battery_current", 4),
    Field::int("battery_temp", 1),
    Field::int("open_bms_idx", 1),
    Field::int("battery_capacity_design", 4),
    Field::int("battery_capacity_remain", 4),
    Field::int("battery_capacity_full", 4),
    Field::int("battery_cycles", 4),
    Field::int("soh", 1),
    Field::scaled("battery_voltage_max", 2, 1000),
    Field::scaled("battery_voltage_min", 2, 1000),
    Field::int("battery_temp_max", 1),
    Field::int("battery_temp_min", 1),
    Field::int("battery_mos_temp_max", 1),
    Field::int("battery_mos_temp_min", 1),
    Field::int("battery_fault", 1),
    Field::int("sys_stat_reg", 1),
    Field::int("tag_chg_current", 4),
    Field::float("battery_level_f32"),
    Field::int("battery_in_power", 4),
    Field::int("battery_out_power", 4),
    Field::minutes("battery_remain"),
];

/// Per-pack battery record on River products, always describing pack 1.
pub const BMS_RIVER: &[Field] = &[
    Field::int("battery_error", 4),
    Field::version("battery_version"),
    Field::int("battery_level", 1),
    Field::scaled("battery_voltage", 4, 1000),
    Field::int("battery_current", 4),
    Field::int("battery_temp", 1),
    Field::int("battery_capacity_remain", 4),
    Field::int("battery_capacity_full", 4),
    Field::int("battery_cycles", 4),
    Field::int("ambient_mode", 1),
    Field::int("ambient_animate", 1),
    Field::raw("ambient_color", 4),
    Field::int("ambient_brightness", 1),
];

use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_OCCUPIED_COOL_F: f32 = 74.0;
pub const DEFAULT_OCCUPIED_HEAT_F: f32 = 68.0;
pub const DEFAULT_UNOCCUPIED_COOL_F: f32 = 85.0;
pub const DEFAULT_UNOCCUPIED_HEAT_F: f32 = 60.0;

pub const DEFAULT_DEADBAND_F: f32 = 2.0;
pub const DEFAULT_ECONOMIZER_DIFFERENTIAL_F: f32 = 5.0;
pub const DEFAULT_DCV_MIN_POSITION_PCT: u8 = 20;
pub const DEFAULT_DCV_TARGET_PPM: u16 = 800;
pub const DEFAULT_DCV_SPAN_PPM: u16 = 600;
pub const DEFAULT_FAN_FAIL_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_FREEZE_LIMIT_F: f32 = 40.0;
pub const DEFAULT_HIGH_ZONE_TEMP_RAISE_F: f32 = 85.0;
pub const DEFAULT_HIGH_ZONE_TEMP_CLEAR_F: f32 = 84.0;
pub const DEFAULT_SCAN_PERIOD_MS: u64 = 1000;

// Occupied band must be tighter than the unoccupied band.
const_assert!(DEFAULT_OCCUPIED_COOL_F < DEFAULT_UNOCCUPIED_COOL_F);
const_assert!(DEFAULT_OCCUPIED_HEAT_F > DEFAULT_UNOCCUPIED_HEAT_F);

/// Cooling/heating setpoint pair for one occupancy mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetpointProfile {
    pub cooling_setpoint_f: f32,
    pub heating_setpoint_f: f32,
}

impl SetpointProfile {
    pub fn occupied_default() -> Self {
        Self {
            cooling_setpoint_f: DEFAULT_OCCUPIED_COOL_F,
            heating_setpoint_f: DEFAULT_OCCUPIED_HEAT_F,
        }
    }

    pub fn unoccupied_default() -> Self {
        Self {
            cooling_setpoint_f: DEFAULT_UNOCCUPIED_COOL_F,
            heating_setpoint_f: DEFAULT_UNOCCUPIED_HEAT_F,
        }
    }
}

/// Full controller tuning record. Every value is externally configurable and
/// defaults to the shipped commissioning profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub occupied: SetpointProfile,
    pub unoccupied: SetpointProfile,
    pub deadband_f: f32,
    pub economizer_differential_f: f32,
    pub dcv_min_position_pct: u8,
    pub dcv_target_ppm: u16,
    /// CO2 proportional band width above the target; the damper reaches
    /// fully open at target + span.
    pub dcv_span_ppm: u16,
    pub fan_fail_timeout_ms: u64,
    pub freeze_limit_f: f32,
    /// When set, an active low-discharge-temperature alarm forces the unit
    /// off the same way a fan failure does. Off by default; the alarm alone
    /// is the normative behavior.
    pub freeze_shutdown_enabled: bool,
    pub high_zone_temp_raise_f: f32,
    pub high_zone_temp_clear_f: f32,
    pub scan_period_ms: u64,
    pub status_publish_period_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            occupied: SetpointProfile::occupied_default(),
            unoccupied: SetpointProfile::unoccupied_default(),
            deadband_f: DEFAULT_DEADBAND_F,
            economizer_differential_f: DEFAULT_ECONOMIZER_DIFFERENTIAL_F,
            dcv_min_position_pct: DEFAULT_DCV_MIN_POSITION_PCT,
            dcv_target_ppm: DEFAULT_DCV_TARGET_PPM,
            dcv_span_ppm: DEFAULT_DCV_SPAN_PPM,
            fan_fail_timeout_ms: DEFAULT_FAN_FAIL_TIMEOUT_MS,
            freeze_limit_f: DEFAULT_FREEZE_LIMIT_F,
            freeze_shutdown_enabled: false,
            high_zone_temp_raise_f: DEFAULT_HIGH_ZONE_TEMP_RAISE_F,
            high_zone_temp_clear_f: DEFAULT_HIGH_ZONE_TEMP_CLEAR_F,
            scan_period_ms: DEFAULT_SCAN_PERIOD_MS,
            status_publish_period_ms: DEFAULT_SCAN_PERIOD_MS,
        }
    }
}

impl ControllerConfig {
    /// Load and validate a configuration from a JSON file. Missing fields
    /// take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the control pipeline cannot run safely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (mode, profile) in [("occupied", &self.occupied), ("unoccupied", &self.unoccupied)] {
            if profile.heating_setpoint_f + self.deadband_f
                >= profile.cooling_setpoint_f - self.deadband_f
            {
                return Err(ConfigError::OverlappingBands { mode });
            }
        }
        if self.deadband_f <= 0.0 {
            return Err(ConfigError::InvalidValue("deadband_f must be positive"));
        }
        if self.economizer_differential_f < 0.0 {
            return Err(ConfigError::InvalidValue("economizer_differential_f must be non-negative"));
        }
        if self.dcv_min_position_pct > 100 {
            return Err(ConfigError::InvalidValue("dcv_min_position_pct must be 0-100"));
        }
        if self.dcv_span_ppm == 0 {
            return Err(ConfigError::InvalidValue("dcv_span_ppm must be positive"));
        }
        if self.fan_fail_timeout_ms == 0 || self.scan_period_ms == 0 {
            return Err(ConfigError::InvalidValue("timing periods must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{mode} heating and cooling bands overlap")]
    OverlappingBands { mode: &'static str },
    #[error("invalid config value: {0}")]
    InvalidValue(&'static str),
}

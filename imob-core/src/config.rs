//! Firmware timing and threshold configuration
//!
//! Defaults are the values the reference board ships with. A JSON file can
//! override any subset of them.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Main loop tick period
    pub tick_ms: u64,
    /// Unauthenticated peers are dropped after this long
    pub disconnect_timeout_ms: u64,
    /// A never-armed device with nobody connected arms itself after this long
    pub auto_arm_timeout_ms: u64,
    /// Pulse-line settle time before and after the relay toggles
    pub relay_pulse_ms: u64,
    /// How long the relay stays engaged
    pub relay_block_ms: u64,
    /// Per-axis accelerometer delta that counts as motion (strictly greater)
    pub motion_threshold: i32,
    /// Charger readings at or below this are "discharging"
    pub charger_low_threshold: f32,
    /// Charger readings above this are "charging"
    pub charger_high_threshold: f32,
    /// Contact readings above this mean ignition on
    pub contact_threshold: f32,
    /// Initial battery scale (reading * scale = percent), recalibrated once on first full charge
    pub battery_scale: f32,
    /// Typical RNG latency per byte (124 us on nRF52, 677 us on nRF51)
    pub rng_byte_wait_us: u32,
}

/// Longest relay pulse or block period accepted (one day)
const MAX_RELAY_MS: u64 = 24 * 60 * 60 * 1000;
/// Longest main loop tick accepted
const MAX_TICK_MS: u64 = 60_000;
/// Longest per-byte RNG back-off accepted
const MAX_RNG_BYTE_WAIT_US: u32 = 10_000;

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_ms: 80,
            disconnect_timeout_ms: 10_000,
            auto_arm_timeout_ms: 25_000,
            relay_pulse_ms: 100,
            relay_block_ms: 120_000,
            motion_threshold: 110,
            charger_low_threshold: 0.4,
            charger_high_threshold: 0.9,
            contact_threshold: 0.21,
            battery_scale: 100.0,
            rng_byte_wait_us: 124,
        }
    }
}

impl Config {
    /// Load a JSON config file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&data)?;
        Ok(config)
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 || self.tick_ms > MAX_TICK_MS {
            return Err(ConfigError::Invalid(format!("tick_ms must be within 1..={MAX_TICK_MS}")));
        }
        if self.relay_pulse_ms == 0 || self.relay_block_ms == 0 {
            return Err(ConfigError::Invalid("relay durations must be non-zero".into()));
        }
        for (name, value) in [
            ("relay_pulse_ms", self.relay_pulse_ms),
            ("relay_block_ms", self.relay_block_ms),
        ] {
            if value > MAX_RELAY_MS {
                return Err(ConfigError::Invalid(format!("{name} must not exceed {MAX_RELAY_MS}")));
            }
        }
        for (name, value) in [
            ("disconnect_timeout_ms", self.disconnect_timeout_ms),
            ("auto_arm_timeout_ms", self.auto_arm_timeout_ms),
        ] {
            if u32::try_from(value / self.tick_ms).is_err() {
                return Err(ConfigError::Invalid(format!(
                    "{name} spans more than {} ticks",
                    u32::MAX
                )));
            }
        }
        if self.rng_byte_wait_us > MAX_RNG_BYTE_WAIT_US {
            return Err(ConfigError::Invalid(format!(
                "rng_byte_wait_us must not exceed {MAX_RNG_BYTE_WAIT_US}"
            )));
        }
        for (name, value) in [
            ("charger_low_threshold", self.charger_low_threshold),
            ("charger_high_threshold", self.charger_high_threshold),
            ("contact_threshold", self.contact_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{name} must be within [0, 1]")));
            }
        }
        if self.charger_low_threshold >= self.charger_high_threshold {
            return Err(ConfigError::Invalid(
                "charger_low_threshold must be below charger_high_threshold".into(),
            ));
        }
        if self.motion_threshold < 0 {
            return Err(ConfigError::Invalid("motion_threshold must not be negative".into()));
        }
        if self.battery_scale.is_nan() || self.battery_scale <= 0.0 {
            return Err(ConfigError::Invalid("battery_scale must be positive".into()));
        }
        Ok(())
    }

    /// Disconnection watchdog threshold in ticks
    pub fn disconnect_ticks(&self) -> u32 {
        ticks(self.disconnect_timeout_ms, self.tick_ms)
    }

    /// Auto-arm watchdog threshold in ticks
    pub fn auto_arm_ticks(&self) -> u32 {
        ticks(self.auto_arm_timeout_ms, self.tick_ms)
    }
}

/// Whole ticks in `timeout_ms`, saturating instead of wrapping
fn ticks(timeout_ms: u64, tick_ms: u64) -> u32 {
    u32::try_from(timeout_ms / tick_ms.max(1)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tick_thresholds() {
        let config = Config::default();
        assert_eq!(config.disconnect_ticks(), 125);
        assert_eq!(config.auto_arm_ticks(), 312);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{ "tick_ms": 100, "relay_block_ms": 5000 }"#).unwrap();
        assert_eq!(config.tick_ms, 100);
        assert_eq!(config.relay_block_ms, 5000);
        assert_eq!(config.relay_pulse_ms, 100);
        assert_eq!(config.disconnect_ticks(), 100);
    }

    #[test]
    fn rejects_inverted_charger_thresholds() {
        let err = Config::from_json(r#"{ "charger_low_threshold": 0.95 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_or_huge_tick() {
        let config = Config { tick_ms: 0, ..Config::default() };
        assert!(config.validate().is_err());
        let config = Config { tick_ms: u64::MAX, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_relay_durations_past_a_day() {
        let config = Config { relay_block_ms: u64::MAX, ..Config::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = Config { relay_pulse_ms: MAX_RELAY_MS + 1, ..Config::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = Config { relay_block_ms: MAX_RELAY_MS, ..Config::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_long_rng_wait() {
        let err = Config::from_json(r#"{ "rng_byte_wait_us": 1000000000 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_timeouts_overflowing_tick_counters() {
        let config = Config {
            tick_ms: 1,
            disconnect_timeout_ms: 4_294_967_396,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = Config {
            tick_ms: 1,
            auto_arm_timeout_ms: u64::MAX,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn tick_thresholds_saturate() {
        let config = Config {
            tick_ms: 1,
            disconnect_timeout_ms: 4_294_967_396,
            ..Config::default()
        };
        assert_eq!(config.disconnect_ticks(), u32::MAX);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(Config::from_json("{ tick_ms"), Err(ConfigError::Parse(_))));
    }
}

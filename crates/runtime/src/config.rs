//! Engine tuning
//!
//! ## Configuration (Environment Variables)
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LADDER_SCAN_INTERVAL_MS` | `10` | Sleep between two scans of one wire |
//! | `LADDER_SPAWN_STAGGER_MS` | `200` | Delay between starting consecutive wires |
//! | `LADDER_STACK_SIZE` | `0x20000` | Coroutine stack size per scan unit, bytes |
//! | `LADDER_MEMORY_BUDGET` | unset | Bytes available to scan units; unset uses the host's free memory |
//! | `LADDER_EDGE_CAPACITY` | `64` | Edge-detection table slots |
//! | `LADDER_TIMER_CAPACITY` | `32` | Timer-state table slots |
//! | `LADDER_CONFIG_TIMEOUT_MS` | `10000` | Inactivity timeout for chunked configurations |
//! | `LADDER_SENSOR_INTERVAL_MS` | `1000` | OneWire/ADC refresh period |
//!
//! Zero or unparseable values are warned about and replaced by the default,
//! except `LADDER_SPAWN_STAGGER_MS` where zero is allowed.

use std::time::Duration;
use tracing::warn;

pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 10;
pub const DEFAULT_SPAWN_STAGGER_MS: u64 = 200;
pub const DEFAULT_STACK_SIZE: usize = 0x20000;
pub const DEFAULT_EDGE_CAPACITY: usize = 64;
pub const DEFAULT_TIMER_CAPACITY: usize = 32;
pub const DEFAULT_CONFIG_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_SENSOR_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub scan_interval: Duration,
    pub spawn_stagger: Duration,
    pub stack_size: usize,
    pub memory_budget: Option<usize>,
    pub edge_capacity: usize,
    pub timer_capacity: usize,
    pub config_timeout: Duration,
    pub sensor_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(DEFAULT_SCAN_INTERVAL_MS),
            spawn_stagger: Duration::from_millis(DEFAULT_SPAWN_STAGGER_MS),
            stack_size: DEFAULT_STACK_SIZE,
            memory_budget: None,
            edge_capacity: DEFAULT_EDGE_CAPACITY,
            timer_capacity: DEFAULT_TIMER_CAPACITY,
            config_timeout: Duration::from_millis(DEFAULT_CONFIG_TIMEOUT_MS),
            sensor_interval: Duration::from_millis(DEFAULT_SENSOR_INTERVAL_MS),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let ms = |key: &str, default: u64, allow_zero: bool| {
            Duration::from_millis(parse_setting(key, lookup(key), default, allow_zero))
        };
        Self {
            scan_interval: ms("LADDER_SCAN_INTERVAL_MS", DEFAULT_SCAN_INTERVAL_MS, false),
            spawn_stagger: ms("LADDER_SPAWN_STAGGER_MS", DEFAULT_SPAWN_STAGGER_MS, true),
            stack_size: parse_setting(
                "LADDER_STACK_SIZE",
                lookup("LADDER_STACK_SIZE"),
                DEFAULT_STACK_SIZE,
                false,
            ),
            memory_budget: lookup("LADDER_MEMORY_BUDGET")
                .map(|v| parse_setting("LADDER_MEMORY_BUDGET", Some(v), 0, false))
                .filter(|&v| v > 0),
            edge_capacity: parse_setting(
                "LADDER_EDGE_CAPACITY",
                lookup("LADDER_EDGE_CAPACITY"),
                DEFAULT_EDGE_CAPACITY,
                false,
            ),
            timer_capacity: parse_setting(
                "LADDER_TIMER_CAPACITY",
                lookup("LADDER_TIMER_CAPACITY"),
                DEFAULT_TIMER_CAPACITY,
                false,
            ),
            config_timeout: ms("LADDER_CONFIG_TIMEOUT_MS", DEFAULT_CONFIG_TIMEOUT_MS, false),
            sensor_interval: ms("LADDER_SENSOR_INTERVAL_MS", DEFAULT_SENSOR_INTERVAL_MS, false),
        }
    }
}

/// Parse one numeric setting, accepting a `0x` prefix for hex.
/// Missing values yield the default silently; invalid ones with a warning.
fn parse_setting<T>(key: &str, value: Option<String>, default: T, allow_zero: bool) -> T
where
    T: TryFrom<u64> + Copy + std::fmt::Display,
{
    let Some(raw) = value else {
        return default;
    };
    let trimmed = raw.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => trimmed.parse::<u64>().ok(),
    };
    match parsed {
        Some(0) if !allow_zero => {
            warn!("{}=0 is invalid, using default {}", key, default);
            default
        }
        Some(n) => match T::try_from(n) {
            Ok(v) => v,
            Err(_) => {
                warn!("{}='{}' is out of range, using default {}", key, raw, default);
                default
            }
        },
        None => {
            warn!(
                "{}='{}' is not a valid number, using default {}",
                key, raw, default
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(EngineConfig::from_lookup(lookup(&[])), EngineConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("LADDER_SCAN_INTERVAL_MS", "25"),
            ("LADDER_SPAWN_STAGGER_MS", "0"),
            ("LADDER_STACK_SIZE", "0x10000"),
            ("LADDER_MEMORY_BUDGET", "1048576"),
            ("LADDER_EDGE_CAPACITY", "8"),
        ]));
        assert_eq!(config.scan_interval, Duration::from_millis(25));
        assert_eq!(config.spawn_stagger, Duration::ZERO);
        assert_eq!(config.stack_size, 0x10000);
        assert_eq!(config.memory_budget, Some(1_048_576));
        assert_eq!(config.edge_capacity, 8);
        assert_eq!(config.timer_capacity, DEFAULT_TIMER_CAPACITY);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("LADDER_SCAN_INTERVAL_MS", "0"),
            ("LADDER_STACK_SIZE", "big"),
            ("LADDER_MEMORY_BUDGET", "lots"),
            ("LADDER_TIMER_CAPACITY", "-1"),
        ]));
        assert_eq!(config.scan_interval, Duration::from_millis(DEFAULT_SCAN_INTERVAL_MS));
        assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
        assert_eq!(config.memory_budget, None);
        assert_eq!(config.timer_capacity, DEFAULT_TIMER_CAPACITY);
    }
}

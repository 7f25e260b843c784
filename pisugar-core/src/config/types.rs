//! Configuration type definitions
//!
//! Every field has a default, so a partial (or empty) TOML document is a
//! valid configuration:
//!
//! ```toml
//! [bus]
//! speed_hz = 100000
//! spin_limit = 1000000
//! address = 0x75
//!
//! [monitor]
//! poll_interval_s = 5
//! low_battery_percent = 10
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fastest bus speed the BSC master runs reliably at
pub const MAX_SPEED_HZ: u32 = 31_250_000;

/// Slowest bus speed whose clock divider fits the 16-bit register on
/// every supported core clock (550 MHz / 0xFFFE, rounded up)
pub const MIN_SPEED_HZ: u32 = 8_393;

/// Highest 7-bit slave address
pub const MAX_ADDRESS: u8 = 0x7F;

/// Default fuel gauge address (IP5209)
pub const DEFAULT_ADDRESS: u8 = 0x75;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The text is not valid TOML or has fields of the wrong type
    Parse,
    /// Bus speed outside [`MIN_SPEED_HZ`]..=[`MAX_SPEED_HZ`]
    InvalidSpeed,
    /// Address does not fit in 7 bits
    InvalidAddress,
    /// Poll interval is zero
    InvalidPollInterval,
    /// Low battery threshold is above 100 %
    InvalidPercent,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::Parse => f.write_str("malformed configuration"),
            ConfigError::InvalidSpeed => write!(f, "bus speed must be {}..={} Hz", MIN_SPEED_HZ, MAX_SPEED_HZ),
            ConfigError::InvalidAddress => write!(f, "address above {:#x}", MAX_ADDRESS),
            ConfigError::InvalidPollInterval => f.write_str("poll interval must be non-zero"),
            ConfigError::InvalidPercent => f.write_str("low battery threshold above 100%"),
        }
    }
}

/// Bus settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BusConfig {
    /// Bus clock in Hz
    pub speed_hz: u32,
    /// Status polls before a wait gives up
    pub spin_limit: u32,
    /// Fuel gauge slave address
    pub address: u8,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            speed_hz: 100_000,
            spin_limit: 1_000_000,
            address: DEFAULT_ADDRESS,
        }
    }
}

/// Polling settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MonitorSettings {
    /// Seconds between gauge reads
    pub poll_interval_s: u32,
    /// Charge at or below which the battery counts as low
    pub low_battery_percent: u8,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_s: 5,
            low_battery_percent: 10,
        }
    }
}

/// Complete monitor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MonitorConfig {
    pub bus: BusConfig,
    pub monitor: MonitorSettings,
}

impl MonitorConfig {
    /// Check every field is in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SPEED_HZ..=MAX_SPEED_HZ).contains(&self.bus.speed_hz) {
            return Err(ConfigError::InvalidSpeed);
        }
        if self.bus.address > MAX_ADDRESS {
            return Err(ConfigError::InvalidAddress);
        }
        if self.monitor.poll_interval_s == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }
        if self.monitor.low_battery_percent > 100 {
            return Err(ConfigError::InvalidPercent);
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    #[cfg(feature = "toml")]
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|_| ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MonitorConfig::default();
        assert_eq!(config.bus.speed_hz, 100_000);
        assert_eq!(config.bus.address, 0x75);
        assert_eq!(config.monitor.poll_interval_s, 5);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = MonitorConfig::default();
        config.bus.speed_hz = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSpeed));
        config.bus.speed_hz = MAX_SPEED_HZ + 1;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSpeed));
        config.bus.speed_hz = MAX_SPEED_HZ;
        assert_eq!(config.validate(), Ok(()));
        config.bus.speed_hz = MIN_SPEED_HZ - 1;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSpeed));
        config.bus.speed_hz = MIN_SPEED_HZ;
        assert_eq!(config.validate(), Ok(()));

        config.bus.address = 0x80;
        assert_eq!(config.validate(), Err(ConfigError::InvalidAddress));
        config.bus.address = 0x7F;

        config.monitor.poll_interval_s = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidPollInterval));
        config.monitor.poll_interval_s = 1;

        config.monitor.low_battery_percent = 101;
        assert_eq!(config.validate(), Err(ConfigError::InvalidPercent));
    }

    #[test]
    fn test_min_speed_divider_fits() {
        // 550 MHz core, divider register keeps 16 bits with the low bit clear
        assert!(550_000_000 / MIN_SPEED_HZ <= 0xFFFE);
        assert!(550_000_000 / (MIN_SPEED_HZ - 1) > 0xFFFE);
    }

    #[cfg(feature = "toml")]
    mod toml_loading {
        use super::*;

        #[test]
        fn test_empty_document_uses_defaults() {
            assert_eq!(MonitorConfig::from_toml(""), Ok(MonitorConfig::default()));
        }

        #[test]
        fn test_partial_document() {
            let config = MonitorConfig::from_toml(
                "[bus]\nspeed_hz = 400000\naddress = 0x57\n\n[monitor]\nlow_battery_percent = 20\n",
            )
            .unwrap();
            assert_eq!(config.bus.speed_hz, 400_000);
            assert_eq!(config.bus.address, 0x57);
            assert_eq!(config.bus.spin_limit, 1_000_000);
            assert_eq!(config.monitor.poll_interval_s, 5);
            assert_eq!(config.monitor.low_battery_percent, 20);
        }

        #[test]
        fn test_malformed_document() {
            assert_eq!(
                MonitorConfig::from_toml("[bus]\nspeed_hz = \"fast\"\n"),
                Err(ConfigError::Parse)
            );
            assert_eq!(MonitorConfig::from_toml("[bus"), Err(ConfigError::Parse));
        }

        #[test]
        fn test_invalid_values_rejected_after_parse() {
            assert_eq!(
                MonitorConfig::from_toml("[monitor]\npoll_interval_s = 0\n"),
                Err(ConfigError::InvalidPollInterval)
            );
        }
    }
}

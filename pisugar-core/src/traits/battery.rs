//! Battery monitor trait

/// Errors that can occur while reading the battery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BatteryError {
    /// The fuel gauge could not be reached on the bus
    Bus,
    /// The gauge answered with a value outside its valid range
    InvalidReading,
}

impl core::fmt::Display for BatteryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BatteryError::Bus => f.write_str("fuel gauge not reachable"),
            BatteryError::InvalidReading => f.write_str("fuel gauge reading out of range"),
        }
    }
}

/// Snapshot of the battery state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatteryStatus {
    /// Battery voltage in millivolts
    pub voltage_mv: u16,
    /// Estimated state of charge, 0-100 %
    pub charge_percent: u8,
    /// External power is plugged in
    pub power_connected: bool,
    /// The battery is being charged
    pub charging: bool,
}

impl BatteryStatus {
    /// Check if the charge is at or below `threshold_percent`
    /// while running on battery
    pub fn is_low(&self, threshold_percent: u8) -> bool {
        !self.power_connected && self.charge_percent <= threshold_percent
    }
}

/// Trait for battery monitors
///
/// Implementations poll a specific fuel gauge and keep whatever history
/// they need to smooth its readings.
pub trait BatteryMonitor {
    /// Poll the gauge and return the updated state
    ///
    /// `now_s` is a monotonic timestamp in seconds, used to bucket
    /// readings into the rolling history.
    ///
    /// Takes `&mut self` because bus access requires mutable access.
    fn refresh(&mut self, now_s: u64) -> Result<BatteryStatus, BatteryError>;

    /// State from the last successful refresh
    fn last_status(&self) -> Option<BatteryStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_low_only_on_battery() {
        let mut status = BatteryStatus {
            voltage_mv: 3500,
            charge_percent: 8,
            power_connected: false,
            charging: false,
        };
        assert!(status.is_low(10));
        assert!(!status.is_low(5));

        status.power_connected = true;
        assert!(!status.is_low(10));
    }
}

//! PiSugar battery monitor
//!
//! Polls the IP5209 for the cell voltage and VBUS state, keeps a rolling
//! history of the voltage and derives the charge from the minute-smoothed
//! value so a single noisy ADC sample does not make the gauge jump.

use pisugar_core::config::MonitorConfig;
use pisugar_core::history::History;
use pisugar_core::traits::{BatteryError, BatteryMonitor, BatteryStatus};
use pisugar_hal::I2cBus;

use super::curve::charge_percent;
use super::ip5209::Ip5209;

/// Default low battery threshold in percent
pub const DEFAULT_LOW_PERCENT: u8 = 10;

/// Default seconds between gauge reads
pub const DEFAULT_POLL_INTERVAL_S: u32 = 5;

/// PiSugar 2 UPS board
pub struct PiSugar<I2C> {
    gauge: Ip5209<I2C>,
    history: History,
    status: Option<BatteryStatus>,
    low_percent: u8,
    poll_interval_s: u32,
    last_poll_s: Option<u64>,
}

impl<I2C: I2cBus> PiSugar<I2C> {
    /// Monitor with the gauge at its default address
    pub fn new(i2c: I2C) -> Self {
        Self::with_gauge(Ip5209::new(i2c), DEFAULT_LOW_PERCENT, DEFAULT_POLL_INTERVAL_S)
    }

    /// Monitor set up from the `[bus]` address and the `[monitor]` section
    pub fn from_config(i2c: I2C, config: &MonitorConfig) -> Self {
        Self::with_gauge(
            Ip5209::with_address(i2c, config.bus.address),
            config.monitor.low_battery_percent,
            config.monitor.poll_interval_s,
        )
    }

    fn with_gauge(gauge: Ip5209<I2C>, low_percent: u8, poll_interval_s: u32) -> Self {
        Self {
            gauge,
            history: History::new(),
            status: None,
            low_percent,
            poll_interval_s,
            last_poll_s: None,
        }
    }

    /// Refresh if a poll interval has passed since the last attempt
    ///
    /// Returns `None` when no read was due. Failed reads count as attempts,
    /// so a missing gauge is not hammered on every call.
    pub fn poll(&mut self, now_s: u64) -> Option<Result<BatteryStatus, BatteryError>> {
        if let Some(last) = self.last_poll_s {
            if now_s.saturating_sub(last) < self.poll_interval_s as u64 {
                return None;
            }
        }
        self.last_poll_s = Some(now_s);
        Some(self.refresh(now_s))
    }

    /// Seconds between reads done by [`poll`](Self::poll)
    pub fn poll_interval_s(&self) -> u32 {
        self.poll_interval_s
    }

    /// Last battery voltage in millivolts, 0 before the first refresh
    pub fn voltage(&self) -> u16 {
        self.status.map_or(0, |s| s.voltage_mv)
    }

    /// Last estimated charge in percent
    pub fn charge(&self) -> u8 {
        self.status.map_or(0, |s| s.charge_percent)
    }

    /// External power was present at the last refresh
    pub fn power(&self) -> bool {
        self.status.is_some_and(|s| s.power_connected)
    }

    /// The battery was charging at the last refresh
    pub fn charging(&self) -> bool {
        self.status.is_some_and(|s| s.charging)
    }

    /// Running on battery at or below the low threshold
    pub fn is_low(&self) -> bool {
        self.status.is_some_and(|s| s.is_low(self.low_percent))
    }

    /// Voltage history
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Give the bus back
    pub fn release(self) -> I2C {
        self.gauge.release()
    }
}

impl<I2C: I2cBus> BatteryMonitor for PiSugar<I2C> {
    fn refresh(&mut self, now_s: u64) -> Result<BatteryStatus, BatteryError> {
        let voltage_mv = self.gauge.voltage_mv()?;
        let power_connected = self.gauge.power_connected()?;

        self.history.record(voltage_mv as i32, now_s);
        let smoothed = self
            .history
            .minute_average()
            .map_or(voltage_mv, |mv| mv as u16);
        let charge_percent = charge_percent(smoothed);

        let status = BatteryStatus {
            voltage_mv,
            charge_percent,
            power_connected,
            charging: power_connected && charge_percent < 100,
        };
        debug!(
            "battery: {} mV ({} mV avg), {}%, power {}",
            voltage_mv,
            smoothed,
            charge_percent,
            power_connected
        );

        self.status = Some(status);
        Ok(status)
    }

    fn last_status(&self) -> Option<BatteryStatus> {
        self.status
    }
}

//! Raspberry Pi wiring
//!
//! Maps the `[bus]` section of
//! [`MonitorConfig`](pisugar_core::config::MonitorConfig) onto the BSC master.

use pisugar_core::config::BusConfig;
use pisugar_hal_bcm2835::{BscConfig, CoreClock, Deadline};

/// BSC master settings for `bus` on a core running at `core_clock`
///
/// The speed is programmed by `begin`; every status wait gives up after
/// `spin_limit` polls.
pub fn bsc_config(bus: &BusConfig, core_clock: CoreClock) -> BscConfig {
    BscConfig::default()
        .with_core_clock(core_clock)
        .with_speed(bus.speed_hz)
        .with_deadline(Deadline::Spins(bus.spin_limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battery::PiSugar;
    use pisugar_core::config::MonitorConfig;
    use pisugar_core::traits::BatteryMonitor;
    use pisugar_hal_bcm2835::sim::{SimPins, SimWindow};
    use pisugar_hal_bcm2835::{BscMaster, BusId, I2cError};

    #[test]
    fn test_defaults() {
        let config = bsc_config(&BusConfig::default(), CoreClock::Bcm283x);
        assert_eq!(config.default_speed_hz, 100_000);
        assert_eq!(config.deadline, Deadline::Spins(1_000_000));
        assert_eq!(config.core_clock, CoreClock::Bcm283x);
    }

    #[test]
    fn test_bus_section_reaches_the_master() {
        let mut monitor = MonitorConfig::default();
        monitor.bus.speed_hz = 400_000;
        monitor.bus.spin_limit = 50;
        monitor.bus.address = 0x57;

        let config = bsc_config(&monitor.bus, CoreClock::Bcm2711);
        let mut master = BscMaster::new(SimWindow::new(), SimPins::default(), config);
        master.begin(BusId::I2c1).unwrap();
        // 550 MHz / 400 kHz = 1375, low bit dropped
        assert_eq!(master.divider(), 1374);

        master.window_mut().add_device(0x57);
        master.window_mut().stall_done(true);
        let mut buf = [0u8; 1];
        assert_eq!(master.read(0x57, &mut buf), Err(I2cError::Timeout));
        master.window_mut().stall_done(false);

        master
            .window_mut()
            .add_device(0x57)
            .set_registers(0xA2, &[0x00, 0x00]);
        let mut sugar = PiSugar::from_config(&mut master, &monitor);
        assert_eq!(sugar.refresh(0).map(|s| s.voltage_mv), Ok(2600));
    }
}

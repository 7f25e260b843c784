//! IP5209 power bank controller
//!
//! The PiSugar 2 drives its cell through an Injoinic IP5209. The chip
//! exposes an ADC reading of the battery voltage and the VBUS detection
//! state as single-byte registers read through a write-then-read pair.

use pisugar_core::traits::BatteryError;
use pisugar_hal::I2cBus;

/// Default 7-bit bus address
pub const DEFAULT_ADDRESS: u8 = 0x75;

/// IP5209 register addresses
pub mod reg {
    /// VBUS / charger input status
    pub const READ0: u8 = 0x55;
    /// Battery voltage ADC, low byte
    pub const BATVADC_DAT0: u8 = 0xA2;
    /// Battery voltage ADC, high bits
    pub const BATVADC_DAT1: u8 = 0xA3;
}

/// READ0: external power present on VBUS
const VBUS_PRESENT: u8 = 1 << 4;

/// Voltage at ADC zero
const OFFSET_MV: i32 = 2600;

/// ADC step in units of 1e-5 mV
const STEP_UV_X100: i32 = 26855;

/// Readings outside this window are treated as ADC glitches
pub const VALID_MV: core::ops::RangeInclusive<u16> = 2500..=4500;

/// Convert the two voltage ADC bytes to millivolts
///
/// The ADC value is 14-bit two's complement: the low byte plus bits 0..=5
/// of the high byte, bit 5 being the sign. Higher bits are ignored.
pub fn raw_to_millivolts(low: u8, high: u8) -> i32 {
    let raw = (((high & 0x3F) as u16) << 8) | low as u16;
    // Sign-extend from 14 bits
    let raw = ((raw << 2) as i16 >> 2) as i32;
    OFFSET_MV + raw * STEP_UV_X100 / 100_000
}

/// IP5209 driver
pub struct Ip5209<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2cBus> Ip5209<I2C> {
    /// Create a driver at the default address
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DEFAULT_ADDRESS)
    }

    /// Create a driver at a custom address
    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Bus address in use
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Mutable access to the bus
    pub fn bus_mut(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    /// Give the bus back
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn read_register(&mut self, register: u8) -> Result<u8, BatteryError> {
        self.i2c.read_register(self.address, register).map_err(|_| {
            warn!("ip5209: read of register {:#x} failed", register);
            BatteryError::Bus
        })
    }

    /// Battery voltage in millivolts
    pub fn voltage_mv(&mut self) -> Result<u16, BatteryError> {
        let low = self.read_register(reg::BATVADC_DAT0)?;
        let high = self.read_register(reg::BATVADC_DAT1)?;
        let mv = raw_to_millivolts(low, high);
        trace!("ip5209: adc {:#x} {:#x} -> {} mV", high, low, mv);

        match u16::try_from(mv) {
            Ok(mv) if VALID_MV.contains(&mv) => Ok(mv),
            _ => Err(BatteryError::InvalidReading),
        }
    }

    /// Check whether external power is plugged in
    pub fn power_connected(&mut self) -> Result<bool, BatteryError> {
        Ok(self.read_register(reg::READ0)? & VBUS_PRESENT != 0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory IP5209 register map
    pub(crate) struct FakeGauge {
        pub registers: [u8; 256],
        pub address: u8,
        pub fail: bool,
        pub reads: usize,
    }

    impl FakeGauge {
        pub fn new() -> Self {
            Self {
                registers: [0; 256],
                address: DEFAULT_ADDRESS,
                fail: false,
                reads: 0,
            }
        }

        /// Program the voltage ADC with a 14-bit raw value
        pub fn set_raw(&mut self, raw: i16) {
            let bits = (raw as u16) & 0x3FFF;
            self.registers[reg::BATVADC_DAT0 as usize] = bits as u8;
            self.registers[reg::BATVADC_DAT1 as usize] = (bits >> 8) as u8;
        }

        pub fn set_vbus(&mut self, present: bool) {
            self.registers[reg::READ0 as usize] = if present { VBUS_PRESENT } else { 0 };
        }
    }

    #[derive(Debug, PartialEq)]
    pub(crate) struct FakeError;

    impl I2cBus for FakeGauge {
        type Error = FakeError;

        fn write(&mut self, _address: u8, _data: &[u8]) -> Result<(), FakeError> {
            Ok(())
        }

        fn read(&mut self, _address: u8, _buf: &mut [u8]) -> Result<(), FakeError> {
            Err(FakeError)
        }

        fn write_read(
            &mut self,
            address: u8,
            write_data: &[u8],
            read_buf: &mut [u8],
        ) -> Result<(), FakeError> {
            if self.fail || address != self.address || write_data.len() != 1 {
                return Err(FakeError);
            }
            self.reads += 1;
            let start = write_data[0] as usize;
            for (i, b) in read_buf.iter_mut().enumerate() {
                *b = self.registers[(start + i) & 0xFF];
            }
            Ok(())
        }
    }

    #[test]
    fn test_raw_conversion() {
        assert_eq!(raw_to_millivolts(0x00, 0x00), 2600);
        // 5214 * 0.26855 = 1400.2
        assert_eq!(raw_to_millivolts(0x5E, 0x14), 4000);
        // -1 truncates toward zero
        assert_eq!(raw_to_millivolts(0xFF, 0x3F), 2600);
        // -4096 * 0.26855 = -1100.0
        assert_eq!(raw_to_millivolts(0x00, 0x30), 1500);
        // Bits above the sign are ignored
        assert_eq!(raw_to_millivolts(0x5E, 0xD4), 4000);
    }

    #[test]
    fn test_voltage_read() {
        let mut fake = FakeGauge::new();
        fake.set_raw(5214);
        let mut gauge = Ip5209::new(&mut fake);
        assert_eq!(gauge.voltage_mv(), Ok(4000));
        assert_eq!(fake.reads, 2);
    }

    #[test]
    fn test_out_of_range_voltage() {
        let mut fake = FakeGauge::new();
        fake.set_raw(-4096);
        let mut gauge = Ip5209::new(&mut fake);
        assert_eq!(gauge.voltage_mv(), Err(BatteryError::InvalidReading));
    }

    #[test]
    fn test_vbus() {
        let mut fake = FakeGauge::new();
        fake.set_vbus(true);
        assert_eq!(Ip5209::new(&mut fake).power_connected(), Ok(true));
        fake.set_vbus(false);
        assert_eq!(Ip5209::new(&mut fake).power_connected(), Ok(false));
    }

    #[test]
    fn test_bus_errors_map_to_bus() {
        let mut fake = FakeGauge::new();
        fake.fail = true;
        let mut gauge = Ip5209::new(&mut fake);
        assert_eq!(gauge.voltage_mv(), Err(BatteryError::Bus));
        assert_eq!(gauge.power_connected(), Err(BatteryError::Bus));
    }

    #[test]
    fn test_custom_address() {
        let mut fake = FakeGauge::new();
        fake.address = 0x57;
        fake.set_raw(0);
        assert_eq!(Ip5209::new(&mut fake).voltage_mv(), Err(BatteryError::Bus));
        let mut gauge = Ip5209::with_address(&mut fake, 0x57);
        assert_eq!(gauge.address(), 0x57);
        assert_eq!(gauge.voltage_mv(), Ok(2600));
    }
}

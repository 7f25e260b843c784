//! BSC controller pin assignment
//!
//! ```text
//! dev\pin | SDA | SCL |
//! I2c0    |   - |   - |
//! I2c1    |   2 |   3 |
//! I2c2    |   - |   - |
//! ```
//!
//! Only the controller on the 40-pin header (BSC1) is wired up. The other
//! identifiers resolve to no pins at all, so beginning or ending them
//! touches no GPIO.

/// Physical BSC controller selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusId {
    /// BSC0, reserved for the HAT ID EEPROM
    I2c0,
    /// BSC1, GPIO 2/3 on the header
    I2c1,
    /// BSC2, owned by the HDMI block
    I2c2,
}

impl BusId {
    /// GPIO pins (SDA, SCL) routed to this controller
    pub const fn pins(self) -> &'static [u8] {
        match self {
            BusId::I2c1 => &[2, 3],
            BusId::I2c0 | BusId::I2c2 => &[],
        }
    }

    /// Check whether the controller has pins it can drive
    pub const fn is_wired(self) -> bool {
        !self.pins().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_bsc1_is_wired() {
        assert_eq!(BusId::I2c1.pins(), &[2, 3]);
        assert!(BusId::I2c1.is_wired());
        assert!(BusId::I2c0.pins().is_empty());
        assert!(!BusId::I2c2.is_wired());
    }
}

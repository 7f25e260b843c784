//! GPIO pin mode abstractions
//!
//! Peripherals such as the BSC master only reach the outside world once
//! their pins are routed to them. This module describes that routing
//! capability without tying it to a particular GPIO block.

/// Function a GPIO pin is switched to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// Plain digital input (the reset state)
    Input,
    /// Alternate function carrying the I2C SDA/SCL signals
    I2c,
}

/// Capability to change the function of a GPIO pin
///
/// Implementations handle the register manipulation for the specific chip.
pub trait PinModeControl {
    /// Switch `pin` to `mode`
    fn set_pin_mode(&mut self, pin: u8, mode: PinMode);

    /// Switch every pin in `pins` to `mode`
    fn set_pins_mode(&mut self, pins: &[u8], mode: PinMode) {
        for &pin in pins {
            self.set_pin_mode(pin, mode);
        }
    }
}

impl<T: PinModeControl + ?Sized> PinModeControl for &mut T {
    fn set_pin_mode(&mut self, pin: u8, mode: PinMode) {
        (**self).set_pin_mode(pin, mode);
    }
}

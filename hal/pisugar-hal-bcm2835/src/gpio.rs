//! GPIO function select binding
//!
//! Each GPIO pin has a 3-bit function field in one of the GPFSEL
//! registers, ten pins per register. Routing the BSC1 signals to GPIO 2/3
//! means selecting ALT0 for both; returning them to input writes 0b000.

use pisugar_hal::gpio::{PinMode, PinModeControl};

use crate::window::RegisterWindow;

/// Function select registers GPFSEL0..GPFSEL5 cover 54 pins
pub const FSEL_REGISTERS: usize = 6;

/// Highest GPIO number on the BCM2835 bank
pub const MAX_PIN: u8 = 53;

const FSEL_INPUT: u32 = 0b000;
const FSEL_ALT0: u32 = 0b100;
const FSEL_MASK: u32 = 0b111;

/// [`PinModeControl`] over the GPIO block's function select registers
#[derive(Debug)]
pub struct FunctionSelect<W> {
    window: W,
}

impl<W: RegisterWindow> FunctionSelect<W> {
    /// Bind to a window whose first registers are GPFSEL0..GPFSEL5
    pub fn new(window: W) -> Self {
        Self { window }
    }

    /// Give the window back
    pub fn release(self) -> W {
        self.window
    }

    /// Raw 3-bit function field currently programmed for `pin`
    pub fn function(&mut self, pin: u8) -> Option<u32> {
        if pin > MAX_PIN {
            return None;
        }
        let (offset, shift) = field(pin);
        Some((self.window.read(offset) >> shift) & FSEL_MASK)
    }
}

impl<W: RegisterWindow> PinModeControl for FunctionSelect<W> {
    fn set_pin_mode(&mut self, pin: u8, mode: PinMode) {
        if pin > MAX_PIN {
            warn!("ignoring mode change for nonexistent GPIO {}", pin);
            return;
        }
        let function = match mode {
            PinMode::Input => FSEL_INPUT,
            PinMode::I2c => FSEL_ALT0,
        };
        let (offset, shift) = field(pin);
        let value = self.window.read(offset);
        self.window
            .write(offset, (value & !(FSEL_MASK << shift)) | (function << shift));
        trace!("GPIO {} function {}", pin, function);
    }
}

fn field(pin: u8) -> (usize, u32) {
    ((pin / 10) as usize, (pin % 10) as u32 * 3)
}

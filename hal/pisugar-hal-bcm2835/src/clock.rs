//! Core clock and BSC divider arithmetic
//!
//! The BSC clock is the VPU core clock divided by the DIV register. The
//! core clock differs between SoC generations, so it has to be probed
//! before any divider is computed.

use crate::regs::DIVIDER_MASK;

/// Core clock the BSC divider is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoreClock {
    /// BCM2835/6/7 (Pi 1 to Pi 3): 250 MHz
    #[default]
    Bcm283x,
    /// BCM2711 (Pi 4, Pi 400, CM4): 550 MHz
    Bcm2711,
}

/// Where the kernel publishes the board's device-tree compatible list
#[cfg(feature = "std")]
pub const COMPATIBLE_PATH: &str = "/proc/device-tree/compatible";

impl CoreClock {
    /// Core clock frequency in Hz
    pub const fn hz(self) -> u32 {
        match self {
            CoreClock::Bcm283x => 250_000_000,
            CoreClock::Bcm2711 => 550_000_000,
        }
    }

    /// Pick the clock from a device-tree `compatible` property
    ///
    /// Entries are NUL separated, e.g. `raspberrypi,4-model-b\0brcm,bcm2711\0`.
    pub fn from_compatible(compatible: &str) -> Self {
        if compatible
            .split('\0')
            .any(|entry| entry.trim().contains("bcm2711"))
        {
            CoreClock::Bcm2711
        } else {
            CoreClock::Bcm283x
        }
    }

    /// Probe the running SoC
    ///
    /// Falls back to [`CoreClock::Bcm283x`] when the device tree cannot be
    /// read (not a Pi, or no procfs).
    #[cfg(feature = "std")]
    pub fn probe() -> Self {
        match std::fs::read(COMPATIBLE_PATH) {
            Ok(bytes) => Self::from_compatible(&std::string::String::from_utf8_lossy(&bytes)),
            Err(_) => {
                warn!("cannot read {}, assuming a 250 MHz core clock", COMPATIBLE_PATH);
                CoreClock::Bcm283x
            }
        }
    }
}

/// Divider that brings `core_hz` down to `speed_hz`
///
/// A speed of zero asks for the slowest clock the register can express.
pub const fn divider_for(core_hz: u32, speed_hz: u32) -> u32 {
    if speed_hz == 0 {
        DIVIDER_MASK
    } else {
        core_hz / speed_hz
    }
}

/// Value the DIV register actually receives for a requested divider
///
/// Keeps 16 bits and drops the low bit, rounding odd dividers down.
pub const fn mask_divider(divider: u32) -> u32 {
    divider & DIVIDER_MASK
}

/// Time one byte (8 data bits plus ACK) occupies the bus, in microseconds
pub const fn byte_wait_micros(divider: u32, core_hz: u32) -> u64 {
    if core_hz == 0 {
        return 0;
    }
    divider as u64 * 9 * 1_000_000 / core_hz as u64
}

//! BCM2835/BCM2711 HAL for the PiSugar battery monitor
//!
//! This crate drives the SoC's Broadcom Serial Controller (BSC), the I2C
//! master peripheral, directly through its memory-mapped registers. It
//! implements the [`pisugar_hal::I2cBus`] trait as well as
//! [`embedded_hal::i2c::I2c`].
//!
//! The register block must already be mapped into the process (usually from
//! `/dev/gpiomem` or `/dev/mem`); see [`window::MmioWindow`].
//!
//! # Features
//!
//! - `std` (default) - SoC revision probe and wall-clock deadlines
//! - `log` - Emit diagnostics through the `log` facade
//! - `defmt` - Emit diagnostics through `defmt` and derive `defmt::Format`
//! - `sim` - Export [`sim::SimWindow`], a simulated BSC block for tests
//!
//! # Usage
//!
//! ```no_run
//! use pisugar_hal_bcm2835::{BscConfig, BscMaster, BusId, FunctionSelect, MmioWindow};
//!
//! # fn map(_offset: usize) -> *mut u32 { core::ptr::null_mut() }
//! let bsc = unsafe { MmioWindow::new(map(0x804000), 8) }.unwrap();
//! let gpio = unsafe { MmioWindow::new(map(0x200000), 6) }.unwrap();
//!
//! let mut master = BscMaster::new(bsc, FunctionSelect::new(gpio), BscConfig::probe());
//! master.begin(BusId::I2c1).unwrap();
//! let reply = master.receive(2).unwrap();
//! master.end(BusId::I2c1);
//! # let _ = reply;
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;
#[cfg(all(feature = "std", not(test)))]
extern crate std;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod clock;
pub mod error;
pub mod gpio;
pub mod i2c;
pub mod pins;
pub mod regs;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod window;

pub use clock::CoreClock;
pub use error::{BeginError, I2cError, ReasonCode};
pub use gpio::FunctionSelect;
pub use i2c::{BscConfig, BscMaster, ChipSelectPolarity, ClockPhase, ClockPolarity, Deadline};
pub use pins::BusId;
pub use window::{MmioWindow, RegisterWindow};

//! PiSugar Hardware Abstraction Layer
//!
//! This crate defines the hardware abstraction traits shared between the
//! SoC-specific bus driver and the board-agnostic battery logic. Drivers
//! are written against these traits so they can be tested on the host with
//! fakes and run unchanged against the real BSC master.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Battery monitor (pisugar-drivers)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  pisugar-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  pisugar-hal-bcm2835 (BSC master)       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`i2c::I2cBus`] - I2C master operations
//! - [`gpio::PinModeControl`] - Switching pins between GPIO and peripheral functions

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod i2c;

// Re-export key traits at crate root for convenience
pub use gpio::{PinMode, PinModeControl};
pub use i2c::{I2cBus, I2cConfig};

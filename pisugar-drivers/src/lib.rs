//! Fuel gauge drivers
//!
//! This crate provides concrete implementations of the traits defined
//! in pisugar-core:
//!
//! - IP5209 power bank controller (voltage, VBUS detection)
//! - Li-ion charge curve
//! - The PiSugar battery monitor, polling over any [`pisugar_hal::I2cBus`]
//! - An adapter from `embedded-hal` I2C masters to [`pisugar_hal::I2cBus`]
//! - BSC master settings from the monitor configuration (feature `bcm2835`)

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod battery;
#[cfg(any(feature = "bcm2835", test))]
pub mod board;
pub mod bus;

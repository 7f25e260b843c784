//! Board-agnostic core logic for the PiSugar battery monitor
//!
//! This crate contains all logic that does not depend on a specific bus
//! implementation:
//!
//! - Battery monitor trait and reading types
//! - Minute/hour/day rolling history of readings
//! - Configuration type definitions

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod config;
pub mod history;
pub mod traits;

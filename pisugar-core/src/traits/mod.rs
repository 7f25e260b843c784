//! Hardware abstraction traits
//!
//! These traits define the interface between the application logic
//! and chip-specific battery drivers.

pub mod battery;

pub use battery::{BatteryError, BatteryMonitor, BatteryStatus};

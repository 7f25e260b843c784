//! Reading history
//!
//! Smooths noisy gauge readings over minute, hour and day windows.

pub mod rolling;
pub mod window;

pub use rolling::RollingAverage;
pub use window::{History, HOURS_PER_DAY, MINUTES_PER_HOUR};

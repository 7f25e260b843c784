//! Battery monitor implementations

pub mod curve;
pub mod ip5209;
pub mod pisugar;

pub use curve::charge_percent;
pub use ip5209::Ip5209;
pub use pisugar::PiSugar;

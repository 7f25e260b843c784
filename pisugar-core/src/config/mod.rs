//! Configuration types
//!
//! Monitor settings, loadable from TOML text when the `toml` feature is on.

pub mod types;

pub use types::*;

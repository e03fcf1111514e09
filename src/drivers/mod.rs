//! Drivers Module
//!
//! Driver discovery and binding, plus the in-memory simulated driver:
//!
//! - **registry**: probes installed drivers and merges their controllers
//! - **simulated**: snapshot-backed driver for offline runs and tests

pub mod registry;
pub mod simulated;

pub use registry::*;
pub use simulated::*;

//! RAID Module
//!
//! RAID level geometry and byte-size helpers shared by the compiler,
//! the inventory model, and drivers.

pub mod level;
pub mod size;

pub use level::*;
pub use size::*;

//! Inventory Module
//!
//! The controller/disk/volume model populated by drivers or loaded from
//! JSON snapshots.

pub mod graph;
pub mod snapshot;
pub mod types;

#[cfg(test)]
pub mod fixtures;

pub use graph::*;
pub use snapshot::*;
pub use types::*;

//! Domain Layer
//!
//! The [`Driver`] port that every RAID controller family implements. The
//! compiler and session depend only on this trait.

pub mod ports;

pub use ports::*;

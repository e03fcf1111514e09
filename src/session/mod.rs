//! Session Layer
//!
//! Configuration, diffing and the orchestration of one drp-raid run.

pub mod config;
pub mod diff;
pub mod orchestrator;

pub use config::*;
pub use diff::*;
pub use orchestrator::*;

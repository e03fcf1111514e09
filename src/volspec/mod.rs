//! VolSpec Module
//!
//! Declarative volume requests and the compiler that turns them into
//! concrete disk assignments:
//!
//! - **disk**: candidate disk pools and their sort/filter/bucket operations
//! - **spec**: the VolSpec wire format and its validation
//! - **compiler**: disk selection for a single VolSpec
//! - **batch**: ordered, greedy compilation across controllers

pub mod batch;
pub mod compiler;
pub mod disk;
pub mod spec;

pub use batch::*;
pub use disk::*;
pub use spec::*;

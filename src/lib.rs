//! drp-raid - Declarative Hardware RAID Configuration
//!
//! Turns a list of declarative volume requests (VolSpecs) into concrete
//! RAID volumes on the controllers of a bare-metal machine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                              Session                                 │
//! │   load_controllers -> read_wanted -> compile -> diff -> configure    │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ┌────────────────────┐  ┌────────────────────┐  ┌───────────────┐   │
//! │  │  VolSpec Compiler  │  │     Inventory      │  │  RAID Table   │   │
//! │  │  (batch, buckets)  │  │  (arena by index)  │  │  (geometry)   │   │
//! │  └─────────┬──────────┘  └─────────┬──────────┘  └───────┬───────┘   │
//! │            └───────────────────────┼─────────────────────┘           │
//! ├────────────────────────────────────┼─────────────────────────────────┤
//! │                         Driver Registry                              │
//! │   megacli │ storcli │ perccli │ ssacli │ mvcli │ simulated           │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`raid`]: RAID level table and byte-size helpers
//! - [`inventory`]: Controllers, disks, and volumes
//! - [`volspec`]: VolSpec validation and the disk-selection compiler
//! - [`domain`]: The driver port
//! - [`drivers`]: Driver registry and the simulated driver
//! - [`session`]: Configuration, diffing, and orchestration
//! - [`error`]: Error types and handling

pub mod domain;
pub mod drivers;
pub mod error;
pub mod inventory;
pub mod raid;
pub mod session;
pub mod volspec;

// Re-export commonly used types
pub use domain::ports::{Driver, DriverRef};

pub use drivers::{DriverRegistry, SimulatedDriver};

pub use error::{Error, ErrorCategory, Result};

pub use inventory::{
    load_controllers, read_controllers, write_controllers,
    ControllerRecord, DiskRecord, VolumeRecord,
    Inventory, DiskPosition, PciAddress,
};

pub use raid::{format_size, parse_size, RaidLevel};

pub use session::{
    ApplyOutcome, ApplyReport, Session, SessionConfig, VolSpecDiff,
};

pub use volspec::{
    BatchOutcome, DiskSelection, VolSpec, VolSpecDisk, VolSpecDisks, VolSpecs,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

//! Domain Ports - the driver boundary
//!
//! A [`Driver`] wraps one family of vendor RAID tooling (megacli, storcli,
//! perccli, ssacli, mvcli, ...). The compiler and session only ever see the
//! controller snapshots a driver returns and the operations below; parsing
//! vendor output stays inside the driver.
//!
//! Driver calls block until the underlying tool exits.

use crate::error::Result;
use crate::inventory::ControllerRecord;
use crate::volspec::VolSpec;
use std::path::PathBuf;
use std::sync::Arc;

// =============================================================================
// Driver Port
// =============================================================================

/// Port for RAID controller tooling
pub trait Driver: Send + Sync {
    /// Short name, matched against a controller's `Driver` field
    fn name(&self) -> &str;

    /// Tool the driver shells out to, or None if it needs none
    fn executable(&self) -> Option<PathBuf>;

    /// Probe priority; lower values are probed first
    fn order(&self) -> i32;

    /// Whether the tooling works on this machine
    fn useable(&self) -> bool;

    /// Every controller this driver manages
    fn controllers(&self) -> Result<Vec<ControllerRecord>>;

    /// Re-read one controller's disks and volumes in place
    fn refresh(&self, controller: &mut ControllerRecord) -> Result<()>;

    /// Drop volume configuration; with `foreign_only`, only foreign configuration
    fn clear(&self, controller: &ControllerRecord, foreign_only: bool) -> Result<()>;

    /// Create the volume a compiled spec describes
    ///
    /// Must reject specs that have not been compiled. With `force_good`,
    /// disks in a non-good state are made good before use.
    fn create(&self, controller: &ControllerRecord, spec: &VolSpec, force_good: bool) -> Result<()>;

    /// Enable controller-level encryption
    fn encrypt(&self, controller: &ControllerRecord, key: &str, password: &str) -> Result<()>;
}

/// Shared handle to a driver
pub type DriverRef = Arc<dyn Driver>;

//! Driver Registry
//!
//! Holds every known driver, probes which ones can run on this machine, and
//! merges the controllers they report into one PCI-ordered list.

use crate::domain::ports::DriverRef;
use crate::error::{Error, Result};
use crate::inventory::ControllerRecord;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Check that a driver's tool exists and is executable
pub fn driver_installed(driver: &str, executable: &Path) -> Result<()> {
    let not_installed = || Error::DriverNotInstalled {
        driver: driver.to_string(),
        executable: executable.display().to_string(),
    };
    let meta = fs::metadata(executable).map_err(|_| not_installed())?;
    if !meta.is_file() {
        return Err(not_installed());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 == 0 {
            return Err(not_installed());
        }
    }
    Ok(())
}

/// A driver paired with the controllers it reported
pub struct Discovered {
    pub record: ControllerRecord,
    pub driver: DriverRef,
}

// =============================================================================
// Registry
// =============================================================================

/// Known drivers and their probe settings
#[derive(Default)]
pub struct DriverRegistry {
    drivers: Vec<DriverRef>,
    disabled: HashSet<String>,
    executables: BTreeMap<String, PathBuf>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a driver; a driver with the same name is replaced
    pub fn register(&mut self, driver: DriverRef) {
        self.drivers.retain(|d| d.name() != driver.name());
        self.drivers.push(driver);
    }

    pub fn disable(&mut self, name: &str) {
        self.disabled.insert(name.to_string());
    }

    pub fn enable(&mut self, name: &str) {
        self.disabled.remove(name);
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        !self.disabled.contains(name)
    }

    /// Override where a driver's tool lives
    pub fn set_executable(&mut self, name: &str, path: impl Into<PathBuf>) {
        self.executables.insert(name.to_string(), path.into());
    }

    /// Tool path for a driver, honouring overrides
    pub fn executable(&self, driver: &DriverRef) -> Option<PathBuf> {
        self.executables
            .get(driver.name())
            .cloned()
            .or_else(|| driver.executable())
    }

    pub fn get(&self, name: &str) -> Option<DriverRef> {
        self.drivers.iter().find(|d| d.name() == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Registered drivers in probe order
    pub fn ordered(&self) -> Vec<DriverRef> {
        let mut drivers = self.drivers.clone();
        drivers.sort_by_key(|d| d.order());
        drivers
    }

    /// Check whether a driver can be used
    pub fn probe(&self, driver: &DriverRef) -> Result<()> {
        if !self.is_enabled(driver.name()) {
            return Err(Error::DriverUnavailable {
                driver: driver.name().to_string(),
            });
        }
        if let Some(path) = self.executable(driver) {
            driver_installed(driver.name(), &path)?;
        }
        if !driver.useable() {
            return Err(Error::DriverUnavailable {
                driver: driver.name().to_string(),
            });
        }
        Ok(())
    }

    /// Drivers that pass [`probe`](Self::probe), in probe order
    pub fn available(&self) -> Vec<DriverRef> {
        self.ordered()
            .into_iter()
            .filter(|driver| match self.probe(driver) {
                Ok(()) => true,
                Err(e) => {
                    info!(driver = driver.name(), "Skipping driver: {}", e);
                    false
                }
            })
            .collect()
    }

    /// Collect controllers from every usable driver
    ///
    /// Controllers are stably sorted by PCI address. When two drivers report
    /// the same PCI address the one probed first keeps the controller.
    pub fn discover(&self) -> Vec<Discovered> {
        let mut found = Vec::new();
        for driver in self.available() {
            match driver.controllers() {
                Ok(records) => {
                    debug!(driver = driver.name(), controllers = records.len(), "Scanned driver");
                    found.extend(records.into_iter().map(|record| Discovered {
                        record,
                        driver: driver.clone(),
                    }));
                }
                Err(e) => warn!(driver = driver.name(), "Failed to list controllers: {}", e),
            }
        }

        found.sort_by_key(|d| d.record.pci);
        let mut res: Vec<Discovered> = Vec::with_capacity(found.len());
        for d in found {
            if let Some(last) = res.last() {
                if last.record.pci == d.record.pci {
                    debug!(
                        pci = %d.record.pci,
                        driver = d.driver.name(),
                        kept = last.driver.name(),
                        "Dropping duplicate controller"
                    );
                    continue;
                }
            }
            res.push(d);
        }
        info!(controllers = res.len(), "Discovered controllers");
        res
    }
}

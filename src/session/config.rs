//! Session Configuration
//!
//! Settings threaded through one drp-raid run. Values come from
//! [`SessionConfig::default`], then an optional YAML file, then command line
//! flags and `DRP_RAID_*` environment variables.

use crate::drivers::DriverRegistry;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Log creations instead of sending them to drivers, and skip the rescan
    pub dry_run: bool,
    /// Force disks to a good state when creating or clearing
    pub force_good: bool,
    /// Load controllers from this JSON snapshot instead of probing drivers
    pub controller_file: Option<PathBuf>,
    /// Print current volumes as generic (count based) VolSpecs
    pub output_generic: bool,
    /// Drivers never probed
    pub disabled_drivers: Vec<String>,
    /// Tool path overrides keyed by driver name
    pub driver_paths: BTreeMap<String, PathBuf>,
}

impl SessionConfig {
    /// Load a YAML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject driver settings that name no driver or no path
    pub fn validate(&self) -> Result<()> {
        if self.disabled_drivers.iter().any(|name| name.trim().is_empty()) {
            return Err(Error::Configuration("disabled_drivers has an empty driver name".into()));
        }
        for (name, path) in &self.driver_paths {
            if name.trim().is_empty() {
                return Err(Error::Configuration("driver_paths has an empty driver name".into()));
            }
            if path.as_os_str().is_empty() {
                return Err(Error::Configuration(format!("driver_paths.{} is empty", name)));
            }
        }
        Ok(())
    }

    /// Apply driver probe settings to a registry
    pub fn apply_to(&self, registry: &mut DriverRegistry) {
        for name in &self.disabled_drivers {
            registry.disable(name);
        }
        for (name, path) in &self.driver_paths {
            registry.set_executable(name, path.clone());
        }
    }
}

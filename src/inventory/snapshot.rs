//! Controller Snapshots
//!
//! JSON wire records for controllers, physical disks, and volumes. Drivers
//! produce these, `-controller <file>` loads them, and the final inventory is
//! printed in this shape. Field names match the exported names used by the
//! provisioning server (`JBODCapable`, `RaidLevels`, `PCI`, ...).

use super::types::{DiskPosition, MediaType, PciAddress, Protocol};
use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

/// Deserialize `null` as the type's default
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Disk Record
// =============================================================================

/// A physical disk as reported by a driver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskRecord {
    #[serde(rename = "ControllerID", default)]
    pub controller_id: String,
    #[serde(default)]
    pub controller_driver: String,
    /// ID of the volume this disk belongs to, empty when unallocated
    #[serde(rename = "VolumeID", default)]
    pub volume_id: String,
    #[serde(default)]
    pub enclosure: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub used_size: u64,
    #[serde(default)]
    pub sector_count: u64,
    #[serde(default)]
    pub physical_sector_size: u64,
    #[serde(default)]
    pub logical_sector_size: u64,
    #[serde(default)]
    pub slot: u64,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub media_type: MediaType,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "JBOD", default)]
    pub jbod: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub info: BTreeMap<String, String>,
}

impl DiskRecord {
    pub fn position(&self) -> DiskPosition {
        DiskPosition::new(self.enclosure.clone(), self.slot)
    }

    /// Driver-style disk name: `encl:slot`, or just `slot` without an enclosure
    pub fn name(&self) -> String {
        self.position().to_string()
    }
}

// =============================================================================
// Volume Record
// =============================================================================

/// A RAID volume as reported by a driver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeRecord {
    #[serde(rename = "ControllerID", default)]
    pub controller_id: String,
    #[serde(default)]
    pub controller_driver: String,
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub raid_level: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub stripe_size: u64,
    #[serde(default)]
    pub spans: u64,
    #[serde(default)]
    pub span_length: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub disks: Vec<DiskRecord>,
    #[serde(default, deserialize_with = "null_default")]
    pub info: BTreeMap<String, String>,
    /// Synthetic volume standing in for a bare JBOD-exposed disk
    #[serde(default)]
    pub fake: bool,
}

// =============================================================================
// Controller Record
// =============================================================================

/// A RAID controller with its disks and volumes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ControllerRecord {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(default)]
    pub driver: String,
    #[serde(rename = "PCI", default)]
    pub pci: PciAddress,
    #[serde(rename = "AutoJBOD", default)]
    pub auto_jbod: bool,
    #[serde(rename = "JBODCapable", default)]
    pub jbod_capable: bool,
    #[serde(default)]
    pub raid_capable: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub raid_levels: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub volumes: Vec<VolumeRecord>,
    #[serde(default, deserialize_with = "null_default")]
    pub disks: Vec<DiskRecord>,
    #[serde(default, deserialize_with = "null_default")]
    pub info: BTreeMap<String, String>,
}

impl ControllerRecord {
    /// `driver:id`
    pub fn name(&self) -> String {
        format!("{}:{}", self.driver, self.id)
    }

    pub fn disk_at(&self, position: &DiskPosition) -> Option<&DiskRecord> {
        self.disks.iter().find(|d| &d.position() == position)
    }

    pub fn disk_at_mut(&mut self, position: &DiskPosition) -> Option<&mut DiskRecord> {
        self.disks.iter_mut().find(|d| &d.position() == position)
    }

    /// Fake up a `jbod` volume for a disk the controller exposes directly
    pub fn add_jbod_volume(&mut self, disk: &DiskRecord) {
        self.volumes.push(VolumeRecord {
            controller_id: self.id.clone(),
            controller_driver: self.driver.clone(),
            id: disk.name(),
            name: format!("jbod for {}", disk.name()),
            status: disk.status.clone(),
            raid_level: "jbod".to_string(),
            size: disk.size,
            disks: vec![disk.clone()],
            fake: self.auto_jbod,
            ..Default::default()
        });
    }
}

// =============================================================================
// Loading / Saving
// =============================================================================

/// Decode a JSON array of controllers
pub fn read_controllers<R: Read>(reader: R) -> Result<Vec<ControllerRecord>> {
    Ok(serde_json::from_reader(reader)?)
}

/// Load a controller snapshot file
pub fn load_controllers(path: &Path) -> Result<Vec<ControllerRecord>> {
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

/// Pretty-print controllers as JSON
pub fn write_controllers<W: Write>(writer: W, controllers: &[ControllerRecord]) -> Result<()> {
    serde_json::to_writer_pretty(writer, controllers)?;
    Ok(())
}

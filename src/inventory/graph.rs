//! Inventory Graph
//!
//! Controllers, physical disks, and volumes live in flat arenas inside one
//! [`Inventory`] and reference each other by index. A disk points at the
//! controller that owns it and at most one volume; a volume lists its member
//! disks without owning them.
//!
//! The inventory is rebuilt wholesale from controller snapshots on every
//! scan and never patched in place.

use super::snapshot::{ControllerRecord, DiskRecord, VolumeRecord};
use super::types::{DiskId, DiskPosition, MediaType, PciAddress, Protocol, VolumeId};
use crate::raid::{format_size, round_to_stripe, Geometry, RaidLevel};
use crate::volspec::{VolSpec, VolSpecDisk, VolSpecDisks, VolSpecs};
use std::collections::BTreeMap;
use tracing::warn;

// =============================================================================
// Nodes
// =============================================================================

/// A RAID controller
#[derive(Debug, Clone)]
pub struct Controller {
    /// Position in PCI order, stable for the session
    pub idx: usize,
    pub id: String,
    /// Name of the driver that reported this controller
    pub driver: String,
    pub pci: PciAddress,
    /// Bare disks are exposed as JBOD without being asked
    pub auto_jbod: bool,
    pub jbod_capable: bool,
    pub raid_capable: bool,
    pub raid_levels: Vec<String>,
    pub info: BTreeMap<String, String>,
    pub disks: Vec<DiskId>,
    pub volumes: Vec<VolumeId>,
}

impl Controller {
    /// `driver:id`
    pub fn name(&self) -> String {
        format!("{}:{}", self.driver, self.id)
    }
}

/// A physical disk attached to a controller
#[derive(Debug, Clone)]
pub struct PhysicalDisk {
    /// Index of the owning controller
    pub controller: usize,
    /// Volume the disk is a member of
    pub volume: Option<VolumeId>,
    /// Volume ID as the driver reported it
    pub reported_volume: String,
    pub controller_id: String,
    pub controller_driver: String,
    pub enclosure: String,
    pub slot: u64,
    pub size: u64,
    pub used_size: u64,
    pub sector_count: u64,
    pub physical_sector_size: u64,
    pub logical_sector_size: u64,
    pub protocol: Protocol,
    pub media_type: MediaType,
    pub status: String,
    pub jbod: bool,
    pub info: BTreeMap<String, String>,
}

impl PhysicalDisk {
    fn from_record(controller: usize, record: DiskRecord) -> Self {
        Self {
            controller,
            volume: None,
            reported_volume: record.volume_id,
            controller_id: record.controller_id,
            controller_driver: record.controller_driver,
            enclosure: record.enclosure,
            slot: record.slot,
            size: record.size,
            used_size: record.used_size,
            sector_count: record.sector_count,
            physical_sector_size: record.physical_sector_size,
            logical_sector_size: record.logical_sector_size,
            protocol: record.protocol,
            media_type: record.media_type,
            status: record.status,
            jbod: record.jbod,
            info: record.info,
        }
    }

    pub fn position(&self) -> DiskPosition {
        DiskPosition::new(self.enclosure.clone(), self.slot)
    }

    pub fn name(&self) -> String {
        self.position().to_string()
    }
}

/// A RAID volume
#[derive(Debug, Clone)]
pub struct Volume {
    /// Index of the owning controller
    pub controller: usize,
    pub controller_id: String,
    pub controller_driver: String,
    pub id: String,
    pub name: String,
    pub status: String,
    pub raid_level: String,
    pub size: u64,
    pub stripe_size: u64,
    pub spans: u64,
    pub span_length: u64,
    pub disks: Vec<DiskId>,
    pub info: BTreeMap<String, String>,
    /// Synthetic volume for a bare JBOD disk
    pub fake: bool,
}

impl Volume {
    /// Space the volume uses on each member disk, or None for an unknown level
    pub fn per_disk_size(&self) -> Option<u64> {
        let level: RaidLevel = self.raid_level.parse().ok()?;
        let geometry = Geometry {
            spans: self.spans,
            disks_per_span: self.span_length,
        };
        round_to_stripe(self.stripe_size, level.per_disk_size(geometry, self.size))
    }

    pub fn is_encrypted(&self) -> bool {
        self.info.get("Encrypted").map(String::as_str) == Some("true")
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// All controllers visible to the session
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    controllers: Vec<Controller>,
    disks: Vec<PhysicalDisk>,
    volumes: Vec<Volume>,
}

impl Inventory {
    /// Build an inventory; controllers get `idx` in the order given
    pub fn from_records(records: Vec<ControllerRecord>) -> Self {
        let mut inventory = Self::default();
        for (idx, record) in records.into_iter().enumerate() {
            inventory.add_controller(idx, record);
        }
        inventory
    }

    fn add_controller(&mut self, idx: usize, record: ControllerRecord) {
        let mut controller = Controller {
            idx,
            id: record.id,
            driver: record.driver,
            pci: record.pci,
            auto_jbod: record.auto_jbod,
            jbod_capable: record.jbod_capable,
            raid_capable: record.raid_capable,
            raid_levels: record.raid_levels,
            info: record.info,
            disks: Vec::with_capacity(record.disks.len()),
            volumes: Vec::with_capacity(record.volumes.len()),
        };

        for disk in record.disks {
            controller.disks.push(DiskId(self.disks.len()));
            self.disks.push(PhysicalDisk::from_record(idx, disk));
        }

        for volume in record.volumes {
            let vid = VolumeId(self.volumes.len());
            let mut members = Vec::with_capacity(volume.disks.len());
            for disk in volume.disks {
                let position = disk.position();
                let did = match controller
                    .disks
                    .iter()
                    .copied()
                    .find(|id| self.disks[id.0].position() == position)
                {
                    Some(did) => did,
                    None => {
                        // Member disk the driver did not list on the controller
                        let did = DiskId(self.disks.len());
                        self.disks.push(PhysicalDisk::from_record(idx, disk));
                        did
                    }
                };
                let pd = &mut self.disks[did.0];
                match pd.volume {
                    Some(other) if other != vid => warn!(
                        controller = %controller.name(),
                        disk = %position,
                        volume = %volume.id,
                        previous = %self.volumes[other.0].id,
                        "Disk claimed by more than one volume, keeping the first"
                    ),
                    _ => pd.volume = Some(vid),
                }
                members.push(did);
            }

            self.volumes.push(Volume {
                controller: idx,
                controller_id: volume.controller_id,
                controller_driver: volume.controller_driver,
                id: volume.id,
                name: volume.name,
                status: volume.status,
                raid_level: volume.raid_level,
                size: volume.size,
                stripe_size: volume.stripe_size,
                spans: volume.spans,
                span_length: volume.span_length,
                disks: members,
                info: volume.info,
                fake: volume.fake,
            });
            controller.volumes.push(vid);
        }

        self.controllers.push(controller);
    }

    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    pub fn controller(&self, idx: usize) -> Option<&Controller> {
        self.controllers.get(idx)
    }

    pub fn disk(&self, id: DiskId) -> &PhysicalDisk {
        &self.disks[id.0]
    }

    pub fn volume(&self, id: VolumeId) -> &Volume {
        &self.volumes[id.0]
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Disks owned by a controller, in reported order
    pub fn disks_of(&self, idx: usize) -> impl Iterator<Item = &PhysicalDisk> + '_ {
        self.controllers
            .get(idx)
            .into_iter()
            .flat_map(move |c| c.disks.iter().map(move |id| &self.disks[id.0]))
    }

    /// Volumes on a controller, in reported order
    pub fn volumes_of(&self, idx: usize) -> impl Iterator<Item = (VolumeId, &Volume)> + '_ {
        self.controllers
            .get(idx)
            .into_iter()
            .flat_map(move |c| c.volumes.iter().map(move |&id| (id, &self.volumes[id.0])))
    }

    /// Every disk on a controller as a compiler candidate
    pub fn pool(&self, idx: usize) -> Option<VolSpecDisks> {
        self.controllers.get(idx)?;
        Some(
            self.disks_of(idx)
                .map(|pd| VolSpecDisk {
                    size: pd.size,
                    slot: pd.slot,
                    enclosure: pd.enclosure.clone(),
                    media_type: pd.media_type.clone(),
                    protocol: pd.protocol.clone(),
                    volume: String::new(),
                    info: pd.info.clone(),
                })
                .collect(),
        )
    }

    /// Disk-exact VolSpec describing an existing volume
    pub fn volume_spec(&self, id: VolumeId) -> VolSpec {
        let volume = &self.volumes[id.0];
        let disks: VolSpecDisks = volume
            .disks
            .iter()
            .map(|did| {
                let pd = &self.disks[did.0];
                VolSpecDisk {
                    size: pd.size,
                    slot: pd.slot,
                    enclosure: pd.enclosure.clone(),
                    media_type: pd.media_type.clone(),
                    protocol: pd.protocol.clone(),
                    volume: volume.id.clone(),
                    info: BTreeMap::new(),
                }
            })
            .collect();
        let disks = disks.by_pos();

        let (disk_type, protocol) = disks
            .iter()
            .next()
            .map(|d| (d.media_type.to_string(), d.protocol.to_string()))
            .unwrap_or_default();

        VolSpec {
            raid_level: volume.raid_level.clone(),
            size: format_size(volume.size),
            // jbod volumes have no stripe
            stripe_size: if volume.stripe_size == 0 {
                String::new()
            } else {
                format_size(volume.stripe_size)
            },
            name: volume.name.clone(),
            volume_id: volume.id.clone(),
            disk_type,
            protocol,
            controller: volume.controller,
            disks,
            encrypt: volume.is_encrypted(),
            fake: volume.fake,
            ..Default::default()
        }
    }

    /// Current volumes as VolSpecs
    ///
    /// `specific` gives one disk-exact spec per volume. Otherwise disk lists
    /// become counts, and single-disk raid0 and jbod volumes collapse into
    /// one `raidS`/`jbod` spec with `DiskCount: max` per controller.
    pub fn to_volspecs(&self, specific: bool) -> VolSpecs {
        let mut res = Vec::new();
        for controller in &self.controllers {
            let mut specs = Vec::new();
            let mut raid_s = false;
            let mut jbod = false;
            let mut encrypt = false;

            for &vid in &controller.volumes {
                let spec = self.volume_spec(vid);
                if !specific && spec.disks.len() == 1 {
                    if spec.raid_level == "raid0" {
                        encrypt |= spec.encrypt;
                        raid_s = true;
                        continue;
                    }
                    if spec.raid_level == "jbod" {
                        jbod = true;
                        continue;
                    }
                }
                specs.push(spec);
            }

            if !specific {
                for spec in &mut specs {
                    spec.disk_count = spec.disks.len().to_string();
                    spec.disks = VolSpecDisks::new();
                }
                for (present, level) in [(raid_s, "raidS"), (jbod, "jbod")] {
                    if present {
                        let mut spec = VolSpec::auto(level, "max");
                        spec.controller = controller.idx;
                        spec.encrypt = encrypt;
                        specs.push(spec);
                    }
                }
            }
            res.extend(specs);
        }
        let mut specs = VolSpecs(res);
        specs.sort();
        specs
    }

    /// Snapshot of one controller in wire form
    pub fn controller_record(&self, idx: usize) -> Option<ControllerRecord> {
        let controller = self.controllers.get(idx)?;
        let disk_record = |did: &DiskId| {
            let pd = &self.disks[did.0];
            let volume_id = match pd.volume {
                Some(vid) => self.volumes[vid.0].id.clone(),
                None => pd.reported_volume.clone(),
            };
            DiskRecord {
                controller_id: pd.controller_id.clone(),
                controller_driver: pd.controller_driver.clone(),
                volume_id,
                enclosure: pd.enclosure.clone(),
                size: pd.size,
                used_size: pd.used_size,
                sector_count: pd.sector_count,
                physical_sector_size: pd.physical_sector_size,
                logical_sector_size: pd.logical_sector_size,
                slot: pd.slot,
                protocol: pd.protocol.clone(),
                media_type: pd.media_type.clone(),
                status: pd.status.clone(),
                jbod: pd.jbod,
                info: pd.info.clone(),
            }
        };

        let volumes = controller
            .volumes
            .iter()
            .map(|vid| {
                let v = &self.volumes[vid.0];
                VolumeRecord {
                    controller_id: v.controller_id.clone(),
                    controller_driver: v.controller_driver.clone(),
                    id: v.id.clone(),
                    name: v.name.clone(),
                    status: v.status.clone(),
                    raid_level: v.raid_level.clone(),
                    size: v.size,
                    stripe_size: v.stripe_size,
                    spans: v.spans,
                    span_length: v.span_length,
                    disks: v.disks.iter().map(disk_record).collect(),
                    info: v.info.clone(),
                    fake: v.fake,
                }
            })
            .collect();

        Some(ControllerRecord {
            id: controller.id.clone(),
            driver: controller.driver.clone(),
            pci: controller.pci,
            auto_jbod: controller.auto_jbod,
            jbod_capable: controller.jbod_capable,
            raid_capable: controller.raid_capable,
            raid_levels: controller.raid_levels.clone(),
            volumes,
            disks: controller.disks.iter().map(disk_record).collect(),
            info: controller.info.clone(),
        })
    }

    /// Snapshot of every controller in wire form
    pub fn to_records(&self) -> Vec<ControllerRecord> {
        (0..self.controllers.len())
            .filter_map(|idx| self.controller_record(idx))
            .collect()
    }
}

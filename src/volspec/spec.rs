//! VolSpec
//!
//! A VolSpec is the declarative request for one RAID volume, as written by
//! the user (`{"RaidLevel":"raid1","DiskCount":"min","Size":"min"}`) or
//! derived from an existing volume. [`VolSpec::fill`] applies defaults,
//! validates the request, and hands back a typed [`VolSpecRequest`] for the
//! compiler.

use super::disk::VolSpecDisks;
use crate::error::{Error, Result};
use crate::inventory::snapshot::null_default;
use crate::inventory::{DiskPosition, MediaType, Protocol};
use crate::raid::{parse_size, RaidLevel};
use serde::{Deserialize, Serialize};

/// Smallest explicit volume size accepted
pub const MIN_VOLUME_SIZE: u64 = 100 << 20;
/// Stripe size used when none is given
pub const DEFAULT_STRIPE_SIZE: &str = "64 KB";
pub const MIN_STRIPE_SIZE: u64 = 4 << 10;
pub const MAX_STRIPE_SIZE: u64 = 1 << 20;

pub const DEFAULT_DISK_TYPES: &str = "disk,ssd";
pub const DEFAULT_PROTOCOLS: &str = "nvme,sas,sata";

const VALID_DISK_TYPES: [&str; 4] = ["disk", "ssd", "disk,ssd", "ssd,disk"];
const VALID_PROTOCOLS: [&str; 6] = ["sas", "sata", "nvme", "sas,sata", "sata,sas", "nvme,sas,sata"];

// =============================================================================
// Typed Request
// =============================================================================

/// Requested usable size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeRequest {
    /// Build from the smallest qualifying disks
    Min,
    /// Build from the largest qualifying disks
    Max,
    /// Total usable bytes
    Bytes(u64),
}

/// Requested number of disks for auto selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskCount {
    Min,
    Max,
    Exact(u64),
}

/// How disks are chosen for a VolSpec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskSelection {
    /// An explicit list of disk positions
    Manual(Vec<DiskPosition>),
    /// Let the compiler pick disks
    Auto(DiskCount),
}

/// Validated form of a [`VolSpec`]
#[derive(Debug, Clone)]
pub struct VolSpecRequest {
    pub level: RaidLevel,
    pub size: SizeRequest,
    pub stripe_size: u64,
    pub selection: DiskSelection,
    /// Media type preference, in order
    pub types: Vec<MediaType>,
    /// Protocol preference, in order
    pub protocols: Vec<Protocol>,
}

// =============================================================================
// VolSpec
// =============================================================================

/// Declarative description of one RAID volume
///
/// Only whole physical disks are used; volumes never share a disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolSpec {
    /// Any level in the RAID table
    #[serde(default)]
    pub raid_level: String,
    /// `min`, `max`, or a byte size such as `"500 GB"`; empty means `max`
    #[serde(default)]
    pub size: String,
    /// Power of two between 4 KB and 1 MB; empty means 64 KB
    #[serde(default)]
    pub stripe_size: String,
    #[serde(default)]
    pub name: String,
    /// ID of the volume built from this spec, when reporting existing volumes
    #[serde(rename = "VolumeID", default)]
    pub volume_id: String,
    /// Make this the controller's boot volume
    #[serde(default)]
    pub bootable: bool,
    /// `disk`, `ssd`, `disk,ssd` or `ssd,disk`
    #[serde(rename = "Type", default)]
    pub disk_type: String,
    /// Ordered protocol preference such as `nvme,sas,sata`
    #[serde(default)]
    pub protocol: String,
    /// Index of the target controller in PCI order
    #[serde(default)]
    pub controller: usize,
    /// Explicit disks; only Enclosure and Slot matter on input
    #[serde(default, deserialize_with = "null_default")]
    pub disks: VolSpecDisks,
    /// `min`, `max`, or a positive integer
    #[serde(default)]
    pub disk_count: String,
    #[serde(default)]
    pub encrypt: bool,
    /// Set for volumes that stand in for bare JBOD disks
    #[serde(default)]
    pub fake: bool,
    #[serde(skip)]
    pub(crate) compiled: bool,
    #[serde(skip)]
    pub(crate) index: usize,
}

impl VolSpec {
    /// Auto spec with the given level and disk count
    pub fn auto(level: &str, disk_count: &str) -> Self {
        Self {
            raid_level: level.to_string(),
            disk_count: disk_count.to_string(),
            ..Default::default()
        }
    }

    /// `"<controller>:<level>,<encl>:<slot>,..."`, the identity used for diffing
    pub fn key(&self) -> String {
        let mut key = format!("{}:{}", self.controller, self.raid_level);
        for disk in &self.disks {
            key.push_str(&format!(",{}:{}", disk.enclosure, disk.slot));
        }
        key
    }

    /// Has an explicit disk list rather than a disk count
    pub fn is_manual(&self) -> bool {
        self.disk_count.is_empty()
    }

    /// Set once the batch compiler has assigned concrete disks
    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Position among the controller's volumes this spec will be created at
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn mark_compiled(&mut self) {
        self.disk_count.clear();
        self.compiled = true;
    }

    /// Same controller, level, and disk positions
    pub fn same_volume(&self, other: &VolSpec) -> bool {
        self.controller == other.controller
            && self.raid_level == other.raid_level
            && self.disks.same_positions(&other.disks)
    }

    /// Apply defaults and validate
    ///
    /// Empty fields are rewritten to their defaults in place, so a filled
    /// spec serializes the values the compiler actually used.
    pub fn fill(&mut self) -> Result<VolSpecRequest> {
        let level: RaidLevel = self.raid_level.parse()?;

        let selection = if !self.disks.is_empty() {
            if !self.disk_count.is_empty() {
                return Err(Error::ConflictingDiskSelection);
            }
            DiskSelection::Manual(self.disks.positions())
        } else {
            DiskSelection::Auto(self.fill_disk_count()?)
        };
        let manual = matches!(selection, DiskSelection::Manual(_));

        let size = match self.size.as_str() {
            "" => {
                self.size = "max".to_string();
                SizeRequest::Max
            }
            "min" => SizeRequest::Min,
            "max" => SizeRequest::Max,
            other => {
                let bytes = parse_size(other)?;
                if !manual && bytes < MIN_VOLUME_SIZE {
                    return Err(Error::InvalidSize(
                        "Minimum supported size for a virtual disk is 100 MB".to_string(),
                    ));
                }
                SizeRequest::Bytes(bytes)
            }
        };

        let stripe_size = self.fill_stripe_size()?;

        if let DiskSelection::Manual(positions) = &selection {
            level.check_disk_count(positions.len() as u64)?;
            return Ok(VolSpecRequest {
                level,
                size,
                stripe_size,
                selection,
                types: Vec::new(),
                protocols: Vec::new(),
            });
        }

        if self.disk_type.is_empty() {
            self.disk_type = DEFAULT_DISK_TYPES.to_string();
        } else if !VALID_DISK_TYPES.contains(&self.disk_type.as_str()) {
            return Err(Error::InvalidDiskType(self.disk_type.clone()));
        }
        if self.protocol.is_empty() {
            self.protocol = DEFAULT_PROTOCOLS.to_string();
        } else if !VALID_PROTOCOLS.contains(&self.protocol.as_str()) {
            return Err(Error::InvalidProtocol(self.protocol.clone()));
        }

        Ok(VolSpecRequest {
            level,
            size,
            stripe_size,
            selection,
            types: self.disk_type.split(',').map(MediaType::from).collect(),
            protocols: self.protocol.split(',').map(Protocol::from).collect(),
        })
    }

    fn fill_disk_count(&mut self) -> Result<DiskCount> {
        match self.disk_count.as_str() {
            "" => {
                self.disk_count = "min".to_string();
                Ok(DiskCount::Min)
            }
            "min" => Ok(DiskCount::Min),
            "max" => Ok(DiskCount::Max),
            other => match other.parse::<u64>() {
                Ok(n) if n >= 1 => Ok(DiskCount::Exact(n)),
                _ => Err(Error::InvalidDiskCount(other.to_string())),
            },
        }
    }

    fn fill_stripe_size(&mut self) -> Result<u64> {
        if self.stripe_size.is_empty() {
            self.stripe_size = DEFAULT_STRIPE_SIZE.to_string();
        }
        let invalid = |reason: &str| Error::InvalidStripeSize {
            value: self.stripe_size.clone(),
            reason: reason.to_string(),
        };
        let bytes = parse_size(&self.stripe_size).map_err(|_| invalid("not a valid Size"))?;
        if !(MIN_STRIPE_SIZE..=MAX_STRIPE_SIZE).contains(&bytes) {
            return Err(invalid("It must be between 4KB and 1 MB"));
        }
        if !bytes.is_power_of_two() {
            return Err(invalid("It must be a power of two"));
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volspec::VolSpecDisk;
    use assert_matches::assert_matches;

    fn parse(json: &str) -> VolSpec {
        serde_json::from_str(json).unwrap()
    }

    fn manual(level: &str, slots: &[u64]) -> VolSpec {
        VolSpec {
            raid_level: level.to_string(),
            disks: slots
                .iter()
                .map(|&slot| VolSpecDisk {
                    slot,
                    enclosure: "0".into(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_fill_defaults() {
        let mut spec = parse(r#"{"RaidLevel":"raid5"}"#);
        let request = spec.fill().unwrap();

        assert_eq!(request.level, RaidLevel::Raid5);
        assert_eq!(request.size, SizeRequest::Max);
        assert_eq!(request.stripe_size, 64 << 10);
        assert_eq!(request.selection, DiskSelection::Auto(DiskCount::Min));
        assert_eq!(request.types, vec![MediaType::Disk, MediaType::Ssd]);
        assert_eq!(
            request.protocols,
            vec![Protocol::Nvme, Protocol::Sas, Protocol::Sata]
        );

        assert_eq!(spec.size, "max");
        assert_eq!(spec.stripe_size, "64 KB");
        assert_eq!(spec.disk_count, "min");
        assert_eq!(spec.disk_type, "disk,ssd");
        assert_eq!(spec.protocol, "nvme,sas,sata");
    }

    #[test]
    fn test_fill_rejects_bad_level() {
        let mut spec = parse(r#"{"RaidLevel":"jjbod"}"#);
        assert_matches!(spec.fill(), Err(Error::InvalidRaidLevel(l)) if l == "jjbod");

        let mut spec = parse(r#"{"RaidLevel":"raidS","DiskCount":"max"}"#);
        assert!(spec.fill().is_ok());
    }

    #[test]
    fn test_fill_sizes() {
        let mut spec = parse(r#"{"RaidLevel":"raid1","Size":"500 GB"}"#);
        assert_eq!(spec.fill().unwrap().size, SizeRequest::Bytes(500 << 30));

        let mut spec = parse(r#"{"RaidLevel":"raid1","Size":"50 MB"}"#);
        assert_matches!(spec.fill(), Err(Error::InvalidSize(_)));

        // Existing small volumes come back as manual specs in append mode
        let mut spec = manual("raid1", &[0, 1]);
        spec.size = "50 MB".into();
        assert_eq!(spec.fill().unwrap().size, SizeRequest::Bytes(50 << 20));

        let mut spec = parse(r#"{"RaidLevel":"raid1","Size":"big"}"#);
        assert_matches!(spec.fill(), Err(Error::InvalidSize(_)));

        let mut spec = parse(r#"{"RaidLevel":"raid1","Size":"min"}"#);
        assert_eq!(spec.fill().unwrap().size, SizeRequest::Min);
    }

    #[test]
    fn test_fill_stripe_sizes() {
        for (stripe, ok) in [
            ("4 KB", true),
            ("1 MB", true),
            ("256 KB", true),
            ("2 KB", false),
            ("2 MB", false),
            ("96 KB", false),
            ("lots", false),
        ] {
            let mut spec = VolSpec::auto("raid0", "max");
            spec.stripe_size = stripe.to_string();
            assert_eq!(spec.fill().is_ok(), ok, "stripe {}", stripe);
        }

        let mut spec = VolSpec::auto("raid0", "max");
        spec.stripe_size = "96 KB".into();
        assert_matches!(
            spec.fill(),
            Err(Error::InvalidStripeSize { reason, .. }) if reason.contains("power of two")
        );
    }

    #[test]
    fn test_fill_disk_counts() {
        let mut spec = VolSpec::auto("raid6", "6");
        assert_eq!(
            spec.fill().unwrap().selection,
            DiskSelection::Auto(DiskCount::Exact(6))
        );

        for bad in ["0", "-2", "few"] {
            let mut spec = VolSpec::auto("raid6", bad);
            assert_matches!(spec.fill(), Err(Error::InvalidDiskCount(_)));
        }
    }

    #[test]
    fn test_fill_conflicting_selection() {
        let mut spec = manual("raid1", &[0, 1]);
        spec.disk_count = "min".into();
        assert_matches!(spec.fill(), Err(Error::ConflictingDiskSelection));
    }

    #[test]
    fn test_fill_type_and_protocol() {
        let mut spec = VolSpec::auto("raid1", "min");
        spec.disk_type = "ssd,disk".into();
        spec.protocol = "sata,sas".into();
        let request = spec.fill().unwrap();
        assert_eq!(request.types, vec![MediaType::Ssd, MediaType::Disk]);
        assert_eq!(request.protocols, vec![Protocol::Sata, Protocol::Sas]);

        let mut spec = VolSpec::auto("raid1", "min");
        spec.disk_type = "tape".into();
        assert_matches!(spec.fill(), Err(Error::InvalidDiskType(_)));

        let mut spec = VolSpec::auto("raid1", "min");
        spec.protocol = "sas,nvme".into();
        assert_matches!(spec.fill(), Err(Error::InvalidProtocol(_)));
    }

    #[test]
    fn test_fill_manual_geometry() {
        let mut spec = manual("raid10", &[0, 1, 2]);
        let err = spec.fill().unwrap_err();
        assert_matches!(err, Error::Geometry { .. });
        assert_eq!(err.to_string(), "Raid level raid10 wants at least 4 disks");

        let mut spec = manual("raid10", &[0, 1, 2, 3, 4]);
        assert_eq!(
            spec.fill().unwrap_err().to_string(),
            "Raid level raid10 would want 4 disks, not 5"
        );

        let mut spec = manual("raid10", &[0, 1, 2, 3]);
        let request = spec.fill().unwrap();
        assert_eq!(request.selection, DiskSelection::Manual(spec.disks.positions()));
        // type and protocol are left alone for manual specs
        assert_eq!(spec.disk_type, "");
    }

    #[test]
    fn test_key() {
        let mut spec = manual("raid1", &[3, 4]);
        spec.controller = 1;
        assert_eq!(spec.key(), "1:raid1,0:3,0:4");
        assert_eq!(VolSpec::auto("jbod", "max").key(), "0:jbod");
    }

    #[test]
    fn test_wire_format() {
        let spec = parse(r#"{"RaidLevel":"raid1","DiskCount":"min","Disks":null,"Controller":2}"#);
        assert_eq!(spec.controller, 2);
        assert!(spec.disks.is_empty());
        assert!(!spec.is_compiled());

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["RaidLevel"], "raid1");
        assert_eq!(json["DiskCount"], "min");
        assert!(json.get("compiled").is_none());
        assert!(json.get("VolumeID").is_some());
    }
}

//! Inventory Types
//!
//! Small value types shared by the inventory graph, the wire snapshots,
//! and the VolSpec compiler.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// =============================================================================
// PCI Address
// =============================================================================

/// PCI location of a controller; orders controllers by topology
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PciAddress {
    #[serde(default)]
    pub bus: i64,
    #[serde(default)]
    pub device: i64,
    #[serde(default)]
    pub function: i64,
}

impl std::fmt::Display for PciAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02x}:{:02x}.{:x}", self.bus, self.device, self.function)
    }
}

// =============================================================================
// Protocol
// =============================================================================

/// Low-level protocol a disk uses to talk to its controller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Protocol {
    Sas,
    Sata,
    Nvme,
    Scsi,
    Pcie,
    /// Anything a driver reported that we do not recognize
    Other(String),
}

impl Protocol {
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Sas => "sas",
            Protocol::Sata => "sata",
            Protocol::Nvme => "nvme",
            Protocol::Scsi => "scsi",
            Protocol::Pcie => "pcie",
            Protocol::Other(s) => s.as_str(),
        }
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Other(String::new())
    }
}

impl From<&str> for Protocol {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "sas" => Protocol::Sas,
            "sata" => Protocol::Sata,
            "nvme" => Protocol::Nvme,
            "scsi" => Protocol::Scsi,
            "pcie" => Protocol::Pcie,
            _ => Protocol::Other(s.to_string()),
        }
    }
}

impl From<String> for Protocol {
    fn from(s: String) -> Self {
        Protocol::from(s.as_str())
    }
}

impl From<Protocol> for String {
    fn from(p: Protocol) -> Self {
        p.as_str().to_string()
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PartialOrd for Protocol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Protocol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

// =============================================================================
// Media Type
// =============================================================================

/// Physical media of a disk
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MediaType {
    /// Rotational disk
    Disk,
    Ssd,
    Other(String),
}

impl MediaType {
    pub fn as_str(&self) -> &str {
        match self {
            MediaType::Disk => "disk",
            MediaType::Ssd => "ssd",
            MediaType::Other(s) => s.as_str(),
        }
    }
}

impl Default for MediaType {
    fn default() -> Self {
        MediaType::Other(String::new())
    }
}

impl From<&str> for MediaType {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "disk" | "hdd" => MediaType::Disk,
            "ssd" => MediaType::Ssd,
            _ => MediaType::Other(s.to_string()),
        }
    }
}

impl From<String> for MediaType {
    fn from(s: String) -> Self {
        MediaType::from(s.as_str())
    }
}

impl From<MediaType> for String {
    fn from(m: MediaType) -> Self {
        m.as_str().to_string()
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PartialOrd for MediaType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

// =============================================================================
// Disk Position
// =============================================================================

/// Identity of a disk within one controller
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiskPosition {
    pub enclosure: String,
    pub slot: u64,
}

impl DiskPosition {
    pub fn new(enclosure: impl Into<String>, slot: u64) -> Self {
        Self {
            enclosure: enclosure.into(),
            slot,
        }
    }
}

impl std::fmt::Display for DiskPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.enclosure.is_empty() {
            write!(f, "{}", self.slot)
        } else {
            write!(f, "{}:{}", self.enclosure, self.slot)
        }
    }
}

// =============================================================================
// Arena Indices
// =============================================================================

/// Index of a disk in an [`Inventory`](super::Inventory)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiskId(pub usize);

/// Index of a volume in an [`Inventory`](super::Inventory)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VolumeId(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pci_ordering() {
        let a = PciAddress { bus: 0, device: 3, function: 0 };
        let b = PciAddress { bus: 0, device: 3, function: 1 };
        let c = PciAddress { bus: 1, device: 0, function: 0 };
        assert!(a < b);
        assert!(b < c);
        assert_eq!(format!("{}", c), "01:00.0");
    }

    #[test]
    fn test_protocol_strings() {
        assert_eq!(Protocol::from("SAS"), Protocol::Sas);
        assert_eq!(Protocol::from("nvme"), Protocol::Nvme);
        assert_eq!(Protocol::from("fc"), Protocol::Other("fc".into()));
        assert_eq!(format!("{}", Protocol::Sata), "sata");

        let json = serde_json::to_string(&Protocol::Sas).unwrap();
        assert_eq!(json, "\"sas\"");
        let back: Protocol = serde_json::from_str("\"pcie\"").unwrap();
        assert_eq!(back, Protocol::Pcie);
    }

    #[test]
    fn test_protocol_orders_like_strings() {
        let mut protocols = vec![Protocol::Sata, Protocol::Sas, Protocol::Nvme, Protocol::Pcie];
        protocols.sort();
        assert_eq!(
            protocols,
            vec![Protocol::Nvme, Protocol::Pcie, Protocol::Sas, Protocol::Sata]
        );
    }

    #[test]
    fn test_media_type_strings() {
        assert_eq!(MediaType::from("disk"), MediaType::Disk);
        assert_eq!(MediaType::from("SSD"), MediaType::Ssd);
        assert_eq!(MediaType::default().as_str(), "");
        let back: MediaType = serde_json::from_str("\"ssd\"").unwrap();
        assert_eq!(back, MediaType::Ssd);
    }

    #[test]
    fn test_disk_position_display() {
        assert_eq!(DiskPosition::new("3", 16).to_string(), "3:16");
        assert_eq!(DiskPosition::new("", 4).to_string(), "4");
        assert!(DiskPosition::new("1", 7) < DiskPosition::new("2", 0));
        assert!(DiskPosition::new("1", 2) < DiskPosition::new("1", 10));
    }
}

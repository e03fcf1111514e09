//! RAID Level Table
//!
//! All per-level geometry math lives here: how a disk count splits into
//! spans, the minimum disk count, and the conversions between per-disk
//! contribution and usable capacity. Nothing outside this module encodes
//! level-specific formulas.
//!
//! Spanned levels (raid00, raid10, raid50, raid60) are always built from
//! exactly two spans.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// =============================================================================
// Geometry
// =============================================================================

/// How a set of disks is split into spans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Number of independent parity/mirror groups
    pub spans: u64,
    /// Disks in each span
    pub disks_per_span: u64,
}

impl Geometry {
    /// Total number of disks the geometry consumes
    pub fn total(&self) -> u64 {
        self.spans * self.disks_per_span
    }
}

// =============================================================================
// RAID Level
// =============================================================================

/// RAID levels understood by the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RaidLevel {
    #[serde(rename = "jbod")]
    Jbod,
    /// One single-disk raid0 per disk
    #[serde(rename = "raidS")]
    RaidS,
    #[serde(rename = "concat")]
    Concat,
    #[serde(rename = "raid0")]
    Raid0,
    #[serde(rename = "raid1")]
    Raid1,
    #[serde(rename = "raid1e")]
    Raid1e,
    #[serde(rename = "raid5")]
    Raid5,
    #[serde(rename = "raid6")]
    Raid6,
    #[serde(rename = "raid00")]
    Raid00,
    #[serde(rename = "raid10")]
    Raid10,
    #[serde(rename = "raid50")]
    Raid50,
    #[serde(rename = "raid60")]
    Raid60,
}

impl RaidLevel {
    pub const ALL: [RaidLevel; 12] = [
        RaidLevel::Jbod,
        RaidLevel::RaidS,
        RaidLevel::Concat,
        RaidLevel::Raid0,
        RaidLevel::Raid1,
        RaidLevel::Raid1e,
        RaidLevel::Raid5,
        RaidLevel::Raid6,
        RaidLevel::Raid00,
        RaidLevel::Raid10,
        RaidLevel::Raid50,
        RaidLevel::Raid60,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RaidLevel::Jbod => "jbod",
            RaidLevel::RaidS => "raidS",
            RaidLevel::Concat => "concat",
            RaidLevel::Raid0 => "raid0",
            RaidLevel::Raid1 => "raid1",
            RaidLevel::Raid1e => "raid1e",
            RaidLevel::Raid5 => "raid5",
            RaidLevel::Raid6 => "raid6",
            RaidLevel::Raid00 => "raid00",
            RaidLevel::Raid10 => "raid10",
            RaidLevel::Raid50 => "raid50",
            RaidLevel::Raid60 => "raid60",
        }
    }

    /// Whether the level is nested over multiple spans
    pub fn is_spanned(&self) -> bool {
        matches!(
            self,
            RaidLevel::Raid00 | RaidLevel::Raid10 | RaidLevel::Raid50 | RaidLevel::Raid60
        )
    }

    /// Levels that turn every chosen disk into its own volume
    pub fn is_per_disk(&self) -> bool {
        matches!(self, RaidLevel::Jbod | RaidLevel::RaidS)
    }

    /// Split a disk count into spans
    pub fn spans(&self, total_disks: u64) -> Geometry {
        if self.is_spanned() {
            Geometry {
                spans: 2,
                disks_per_span: total_disks >> 1,
            }
        } else {
            Geometry {
                spans: 1,
                disks_per_span: total_disks,
            }
        }
    }

    /// Smallest disk count that forms a valid array with `spans` spans
    pub fn min_disks(&self, spans: u64) -> u64 {
        match self {
            RaidLevel::Jbod | RaidLevel::RaidS | RaidLevel::Concat | RaidLevel::Raid0 => 1,
            RaidLevel::Raid1 | RaidLevel::Raid1e => 2,
            RaidLevel::Raid5 => 3,
            RaidLevel::Raid6 => 4,
            RaidLevel::Raid00 => spans,
            RaidLevel::Raid10 => spans * 2,
            RaidLevel::Raid50 => spans * 3,
            RaidLevel::Raid60 => spans * 4,
        }
    }

    /// Space each member disk must contribute for `target` usable bytes
    pub fn per_disk_size(&self, geometry: Geometry, target: u64) -> u64 {
        let Geometry {
            spans,
            disks_per_span: dps,
        } = geometry;
        let div = |a: u64, b: u64| a.checked_div(b).unwrap_or(0);
        match self {
            RaidLevel::Jbod | RaidLevel::RaidS | RaidLevel::Raid1 => target,
            RaidLevel::Concat | RaidLevel::Raid0 => div(target, dps),
            RaidLevel::Raid1e => div(target, dps) * 2,
            RaidLevel::Raid5 => div(target, dps.saturating_sub(1)),
            RaidLevel::Raid6 => div(target, dps.saturating_sub(2)),
            RaidLevel::Raid00 => div(div(target, spans), dps),
            RaidLevel::Raid10 => div(div(target, spans), dps) * 2,
            RaidLevel::Raid50 => div(target, (dps * spans).saturating_sub(spans)),
            RaidLevel::Raid60 => div(target, (dps * spans).saturating_sub(spans * 2)),
        }
    }

    /// Usable capacity when each member disk contributes `per_disk` bytes
    pub fn usable_size(&self, geometry: Geometry, per_disk: u64) -> u64 {
        let Geometry {
            spans,
            disks_per_span: dps,
        } = geometry;
        match self {
            RaidLevel::Jbod | RaidLevel::RaidS | RaidLevel::Raid1 => per_disk,
            RaidLevel::Concat | RaidLevel::Raid0 => dps.saturating_mul(per_disk),
            RaidLevel::Raid1e => dps.saturating_mul(per_disk) / 2,
            RaidLevel::Raid5 => per_disk.saturating_mul(dps.saturating_sub(1)),
            RaidLevel::Raid6 => per_disk.saturating_mul(dps.saturating_sub(2)),
            RaidLevel::Raid00 => spans.saturating_mul(dps).saturating_mul(per_disk),
            RaidLevel::Raid10 => per_disk.saturating_mul(spans).saturating_mul(dps) / 2,
            RaidLevel::Raid50 => per_disk.saturating_mul((dps * spans).saturating_sub(spans)),
            RaidLevel::Raid60 => per_disk.saturating_mul((dps * spans).saturating_sub(spans * 2)),
        }
    }

    /// Check that exactly `disk_count` disks form a valid array
    ///
    /// Geometries that would leave disks over are rejected, never truncated.
    pub fn check_disk_count(&self, disk_count: u64) -> Result<Geometry> {
        let geometry = self.spans(disk_count);
        let min = self.min_disks(geometry.spans);
        if disk_count < min {
            return Err(Error::Geometry {
                level: self.to_string(),
                reason: format!("wants at least {} disks", min),
            });
        }
        if geometry.total() != disk_count {
            return Err(Error::Geometry {
                level: self.to_string(),
                reason: format!("would want {} disks, not {}", geometry.total(), disk_count),
            });
        }
        Ok(geometry)
    }

    /// Slice a position-sorted disk list contiguously into per-span groups
    pub fn partition<'a, T>(&self, disks: &'a [T]) -> Vec<&'a [T]> {
        let geometry = self.spans(disks.len() as u64);
        let dps = geometry.disks_per_span as usize;
        let mut rest = disks;
        let mut groups = Vec::with_capacity(geometry.spans as usize);
        for _ in 0..geometry.spans {
            let (head, tail) = rest.split_at(dps.min(rest.len()));
            groups.push(head);
            rest = tail;
        }
        groups
    }

    /// Achievable usable capacity, using the smallest disk as the per-disk size
    pub fn final_size(&self, disk_sizes: &[u64]) -> u64 {
        let smallest = disk_sizes.iter().copied().min().unwrap_or(0);
        self.usable_size(self.spans(disk_sizes.len() as u64), smallest)
    }
}

impl std::fmt::Display for RaidLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RaidLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RaidLevel::ALL
            .iter()
            .copied()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| Error::InvalidRaidLevel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GB: u64 = 1 << 30;

    #[test]
    fn test_parse_levels() {
        for level in RaidLevel::ALL {
            assert_eq!(level.as_str().parse::<RaidLevel>().unwrap(), level);
        }
        assert!("jjbod".parse::<RaidLevel>().is_err());
        assert!("RAID5".parse::<RaidLevel>().is_err());
    }

    #[test]
    fn test_spanned_levels_use_two_spans() {
        for level in RaidLevel::ALL {
            let geometry = level.spans(8);
            if level.is_spanned() {
                assert_eq!(geometry, Geometry { spans: 2, disks_per_span: 4 });
            } else {
                assert_eq!(geometry, Geometry { spans: 1, disks_per_span: 8 });
            }
        }
    }

    #[test]
    fn test_partition_covers_all_disks() {
        for level in RaidLevel::ALL {
            for n in 1..=32u64 {
                let Ok(geometry) = level.check_disk_count(n) else {
                    continue;
                };
                assert_eq!(geometry.total(), n);

                let disks: Vec<u64> = (0..n).collect();
                let groups = level.partition(&disks);
                assert_eq!(groups.len() as u64, geometry.spans);

                let flattened: Vec<u64> = groups.iter().flat_map(|g| g.iter().copied()).collect();
                assert_eq!(flattened, disks, "{} with {} disks", level, n);
                for group in &groups {
                    assert_eq!(group.len() as u64, geometry.disks_per_span);
                }
            }
        }
    }

    #[test]
    fn test_check_disk_count() {
        assert!(RaidLevel::Raid10.check_disk_count(3).is_err());
        assert!(RaidLevel::Raid10.check_disk_count(4).is_ok());
        assert!(RaidLevel::Raid10.check_disk_count(5).is_err());
        assert!(RaidLevel::Raid5.check_disk_count(2).is_err());
        assert!(RaidLevel::Raid5.check_disk_count(3).is_ok());
        assert!(RaidLevel::Raid6.check_disk_count(3).is_err());
        assert!(RaidLevel::Raid50.check_disk_count(6).is_ok());
        assert!(RaidLevel::Raid50.check_disk_count(7).is_err());
        assert!(RaidLevel::Raid60.check_disk_count(8).is_ok());
        assert!(RaidLevel::Raid0.check_disk_count(0).is_err());

        let err = RaidLevel::Raid10.check_disk_count(3).unwrap_err();
        assert_eq!(err.to_string(), "Raid level raid10 wants at least 4 disks");
        let err = RaidLevel::Raid10.check_disk_count(5).unwrap_err();
        assert_eq!(err.to_string(), "Raid level raid10 would want 4 disks, not 5");
        let err = RaidLevel::Raid6.check_disk_count(3).unwrap_err();
        assert_eq!(err.to_string(), "Raid level raid6 wants at least 4 disks");
    }

    #[test]
    fn test_usable_sizes() {
        let pd = 100 * GB;
        let eight = |level: RaidLevel| level.usable_size(level.spans(8), pd);

        assert_eq!(eight(RaidLevel::Raid0), 800 * GB);
        assert_eq!(eight(RaidLevel::Raid1), 100 * GB);
        assert_eq!(eight(RaidLevel::Raid1e), 400 * GB);
        assert_eq!(eight(RaidLevel::Raid5), 700 * GB);
        assert_eq!(eight(RaidLevel::Raid6), 600 * GB);
        assert_eq!(eight(RaidLevel::Raid00), 800 * GB);
        assert_eq!(eight(RaidLevel::Raid10), 400 * GB);
        assert_eq!(eight(RaidLevel::Raid50), 600 * GB);
        assert_eq!(eight(RaidLevel::Raid60), 400 * GB);
    }

    #[test]
    fn test_per_disk_size_inverts_usable_size() {
        let pd = 64 * GB;
        for level in RaidLevel::ALL {
            let geometry = level.spans(8);
            let usable = level.usable_size(geometry, pd);
            assert_eq!(level.per_disk_size(geometry, usable), pd, "{}", level);
        }
    }

    #[test]
    fn test_final_size_uses_smallest_disk() {
        let sizes = [200 * GB, 100 * GB, 300 * GB];
        assert_eq!(RaidLevel::Raid5.final_size(&sizes), 200 * GB);
        assert_eq!(RaidLevel::Raid0.final_size(&sizes), 300 * GB);
        assert_eq!(RaidLevel::Raid1.final_size(&[]), 0);
    }
}

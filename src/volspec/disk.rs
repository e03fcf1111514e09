//! Disk Pools
//!
//! A [`VolSpecDisks`] is the set of candidate disks a VolSpec can be built
//! from. Every operation here is non-mutating: sorts and filters return a new
//! pool and leave the source untouched.

use crate::error::{Error, Result};
use crate::inventory::{DiskPosition, MediaType, Protocol};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ops::Deref;

// =============================================================================
// VolSpec Disk
// =============================================================================

/// A disk as seen by the compiler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolSpecDisk {
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub slot: u64,
    #[serde(default)]
    pub enclosure: String,
    #[serde(rename = "Type", default)]
    pub media_type: MediaType,
    #[serde(default)]
    pub protocol: Protocol,
    /// ID of the volume the disk currently belongs to, if any
    #[serde(default)]
    pub volume: String,
    #[serde(skip)]
    pub info: BTreeMap<String, String>,
}

impl VolSpecDisk {
    pub fn position(&self) -> DiskPosition {
        DiskPosition::new(self.enclosure.clone(), self.slot)
    }

    /// Disks are equal when they sit at the same position
    pub fn same_position(&self, other: &VolSpecDisk) -> bool {
        self.enclosure == other.enclosure && self.slot == other.slot
    }

    fn cmp_pos(&self, other: &VolSpecDisk) -> std::cmp::Ordering {
        (&self.enclosure, self.slot).cmp(&(&other.enclosure, other.slot))
    }
}

/// A homogeneous (media type, protocol) group of disks
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub media_type: MediaType,
    pub protocol: Protocol,
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.media_type, self.protocol)
    }
}

// =============================================================================
// Disk Pool
// =============================================================================

/// Ordered list of candidate disks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolSpecDisks(pub Vec<VolSpecDisk>);

impl VolSpecDisks {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    fn sorted_by<F>(&self, cmp: F) -> Self
    where
        F: FnMut(&VolSpecDisk, &VolSpecDisk) -> std::cmp::Ordering,
    {
        let mut res = self.0.clone();
        res.sort_by(cmp);
        Self(res)
    }

    /// Sorted by (enclosure, slot)
    pub fn by_pos(&self) -> Self {
        self.sorted_by(|a, b| a.cmp_pos(b))
    }

    /// Sorted by ascending size, stable
    pub fn by_size(&self) -> Self {
        self.sorted_by(|a, b| a.size.cmp(&b.size))
    }

    pub fn by_type(&self) -> Self {
        self.sorted_by(|a, b| a.media_type.cmp(&b.media_type))
    }

    pub fn by_protocol(&self) -> Self {
        self.sorted_by(|a, b| a.protocol.cmp(&b.protocol))
    }

    /// Size-sorted suffix of disks at least `size` bytes large
    pub fn min_size(&self, size: u64) -> Self {
        let sorted = self.by_size();
        let idx = sorted.0.partition_point(|d| d.size < size);
        Self(sorted.0[idx..].to_vec())
    }

    /// Up to `n` disks from the front
    pub fn first(&self, n: usize) -> Self {
        Self(self.0.iter().take(n).cloned().collect())
    }

    /// Up to `n` disks from the back, order preserved
    pub fn last(&self, n: usize) -> Self {
        let start = self.0.len().saturating_sub(n);
        Self(self.0[start..].to_vec())
    }

    pub fn at_pos(&self, position: &DiskPosition) -> Option<&VolSpecDisk> {
        self.0
            .iter()
            .find(|d| d.enclosure == position.enclosure && d.slot == position.slot)
    }

    /// Look up each position in the pool, failing on the first missing one
    pub fn select(&self, positions: &[DiskPosition]) -> Result<Self> {
        positions
            .iter()
            .map(|pos| {
                self.at_pos(pos).cloned().ok_or_else(|| Error::DiskNotFound {
                    position: pos.to_string(),
                })
            })
            .collect()
    }

    /// Group disks by (media type, protocol), in order of first appearance
    pub fn bucketize(&self) -> IndexMap<BucketKey, VolSpecDisks> {
        let mut res: IndexMap<BucketKey, VolSpecDisks> = IndexMap::new();
        for disk in &self.0 {
            let key = BucketKey {
                media_type: disk.media_type.clone(),
                protocol: disk.protocol.clone(),
            };
            res.entry(key).or_default().0.push(disk.clone());
        }
        res
    }

    /// This pool minus the claimed disks, order preserved
    pub fn remove(&self, claimed: &VolSpecDisks) -> Self {
        let taken: HashSet<DiskPosition> = claimed.0.iter().map(|d| d.position()).collect();
        self.0
            .iter()
            .filter(|d| !taken.contains(&d.position()))
            .cloned()
            .collect()
    }

    /// Position-wise equality
    pub fn same_positions(&self, other: &VolSpecDisks) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.same_position(b))
    }

    pub fn smallest(&self) -> Option<u64> {
        self.0.iter().map(|d| d.size).min()
    }

    /// Raw capacity the set occupies when every disk contributes the smallest size
    pub fn footprint(&self) -> u64 {
        self.smallest()
            .unwrap_or(0)
            .saturating_mul(self.0.len() as u64)
    }

    pub fn sizes(&self) -> Vec<u64> {
        self.0.iter().map(|d| d.size).collect()
    }

    pub fn positions(&self) -> Vec<DiskPosition> {
        self.0.iter().map(|d| d.position()).collect()
    }

    pub fn push(&mut self, disk: VolSpecDisk) {
        self.0.push(disk);
    }
}

impl Deref for VolSpecDisks {
    type Target = [VolSpecDisk];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<VolSpecDisk>> for VolSpecDisks {
    fn from(disks: Vec<VolSpecDisk>) -> Self {
        Self(disks)
    }
}

impl FromIterator<VolSpecDisk> for VolSpecDisks {
    fn from_iter<I: IntoIterator<Item = VolSpecDisk>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a VolSpecDisks {
    type Item = &'a VolSpecDisk;
    type IntoIter = std::slice::Iter<'a, VolSpecDisk>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for VolSpecDisks {
    type Item = VolSpecDisk;
    type IntoIter = std::vec::IntoIter<VolSpecDisk>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

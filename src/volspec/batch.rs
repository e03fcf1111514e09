//! Batch Compiler
//!
//! Compiles an ordered list of VolSpecs against every controller in an
//! inventory. Each controller gets its own pool holding all of its disks.
//! Specs are compiled strictly in list order and each successful spec
//! removes its disks from the pool, so earlier specs claim disks first.
//!
//! A failed spec is recorded and skipped; the rest of the batch still runs.

use super::spec::VolSpec;
use crate::error::Error;
use crate::inventory::{DiskPosition, Inventory};
use crate::raid::{format_size, RaidLevel};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};
use tracing::{info, warn};

// =============================================================================
// Outcome
// =============================================================================

/// A spec that could not be compiled
#[derive(Debug)]
pub struct SpecFailure {
    /// Position of the spec in the input list
    pub position: usize,
    pub raid_level: String,
    pub error: Error,
}

impl std::fmt::Display for SpecFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "spec {} at {}: {}", self.raid_level, self.position, self.error)
    }
}

/// Result of compiling a batch
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub compiled: VolSpecs,
    pub failures: Vec<SpecFailure>,
}

impl BatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// =============================================================================
// VolSpecs
// =============================================================================

/// Ordered list of VolSpecs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolSpecs(pub Vec<VolSpec>);

impl VolSpecs {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Compile every spec against the inventory
    ///
    /// jbod and raidS results are split into one single-disk spec per chosen
    /// disk. raidS becomes raid0, and so does jbod on a controller that
    /// cannot expose JBOD disks.
    pub fn compile(&self, inventory: &Inventory) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if inventory.is_empty() {
            return outcome;
        }

        let mut pools: Vec<_> = inventory
            .controllers()
            .iter()
            .map(|c| inventory.pool(c.idx).unwrap_or_default())
            .collect();

        // First pass: pick disks
        let mut picked = Vec::with_capacity(self.0.len());
        for (position, spec) in self.0.iter().enumerate() {
            let mut spec = spec.clone();
            info!(
                position,
                level = %spec.raid_level,
                disk_count = %spec.disk_count,
                "Considering spec"
            );

            let Some(pool) = pools.get_mut(spec.controller) else {
                outcome.failures.push(SpecFailure {
                    position,
                    raid_level: spec.raid_level.clone(),
                    error: Error::ControllerNotFound {
                        index: spec.controller,
                    },
                });
                continue;
            };

            match spec.compile(pool) {
                Ok(disks) => {
                    *pool = pool.remove(&disks);
                    spec.disks = disks;
                    picked.push(spec);
                }
                Err(error) => {
                    warn!(position, level = %spec.raid_level, %error, "Spec failed to compile");
                    outcome.failures.push(SpecFailure {
                        position,
                        raid_level: spec.raid_level.clone(),
                        error,
                    });
                }
            }
        }

        // Second pass: one volume per disk for jbod/raidS
        for mut spec in picked {
            let per_disk = spec
                .raid_level
                .parse::<RaidLevel>()
                .map(|l| l.is_per_disk())
                .unwrap_or(false);
            if !per_disk {
                spec.mark_compiled();
                outcome.compiled.0.push(spec);
                continue;
            }

            let jbod_capable = inventory
                .controller(spec.controller)
                .map(|c| c.jbod_capable)
                .unwrap_or(false);
            for disk in spec.disks.iter() {
                let mut single = spec.clone();
                if single.raid_level == RaidLevel::RaidS.as_str() || !jbod_capable {
                    single.raid_level = RaidLevel::Raid0.to_string();
                }
                single.size = format_size(disk.size);
                single.disk_type = disk.media_type.to_string();
                single.protocol = disk.protocol.to_string();
                single.disks = vec![disk.clone()].into();
                single.mark_compiled();
                outcome.compiled.0.push(single);
            }
        }

        info!(
            wanted = self.0.len(),
            compiled = outcome.compiled.len(),
            failed = outcome.failures.len(),
            "Compiled volume specs"
        );
        outcome
    }

    /// Specs keyed by [`VolSpec::key`], in list order
    pub fn by_key(&self) -> IndexMap<String, &VolSpec> {
        self.0.iter().map(|spec| (spec.key(), spec)).collect()
    }

    /// Stable sort by controller, then manual before auto, then first disk position
    pub fn sort(&mut self) {
        self.0.sort_by(compare_specs);
    }

    /// Pairwise [`VolSpec::same_volume`]
    pub fn same_volumes(&self, other: &VolSpecs) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.same_volume(b))
    }

    pub fn push(&mut self, spec: VolSpec) {
        self.0.push(spec);
    }
}

fn first_position(spec: &VolSpec) -> Option<DiskPosition> {
    spec.disks.by_pos().iter().next().map(|d| d.position())
}

fn compare_specs(a: &VolSpec, b: &VolSpec) -> Ordering {
    a.controller
        .cmp(&b.controller)
        .then_with(|| match (a.is_manual(), b.is_manual()) {
            (true, true) => first_position(a).cmp(&first_position(b)),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => Ordering::Equal,
        })
}

impl Deref for VolSpecs {
    type Target = Vec<VolSpec>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for VolSpecs {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<VolSpec>> for VolSpecs {
    fn from(specs: Vec<VolSpec>) -> Self {
        Self(specs)
    }
}

impl FromIterator<VolSpec> for VolSpecs {
    fn from_iter<I: IntoIterator<Item = VolSpec>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for VolSpecs {
    type Item = VolSpec;
    type IntoIter = std::vec::IntoIter<VolSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a VolSpecs {
    type Item = &'a VolSpec;
    type IntoIter = std::slice::Iter<'a, VolSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

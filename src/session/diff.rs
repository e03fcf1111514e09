//! VolSpec Diff
//!
//! Compares the volumes present on the hardware with the compiled wanted
//! specs. Both sides are disk-exact VolSpecs, matched by [`VolSpec::key`].

use crate::volspec::{VolSpec, VolSpecs};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Difference between current and wanted volumes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolSpecDiff {
    /// Existing volumes that are wanted, or that must be left alone
    pub current: VolSpecs,
    /// Wanted volumes that do not exist yet, in compile order
    pub add: VolSpecs,
    /// Existing volumes that are not wanted
    pub rm: VolSpecs,
}

impl VolSpecDiff {
    /// Diff disk-exact current specs against compiled wanted specs
    ///
    /// Fake volumes are never proposed for removal.
    pub fn compute(current: &VolSpecs, wanted: &VolSpecs) -> Self {
        let wanted_keys: HashSet<String> = wanted.iter().map(VolSpec::key).collect();
        let current_keys: HashSet<String> = current.iter().map(VolSpec::key).collect();

        let mut diff = Self::default();
        for spec in current.iter() {
            if !wanted_keys.contains(&spec.key()) && !spec.fake {
                diff.rm.push(spec.clone());
            } else {
                diff.current.push(spec.clone());
            }
        }
        diff.add = wanted
            .iter()
            .filter(|spec| !current_keys.contains(&spec.key()))
            .cloned()
            .collect();
        diff.rm.sort();
        diff
    }

    /// Nothing to add or remove
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.rm.is_empty()
    }
}

//! VolSpec Compiler
//!
//! Turns one VolSpec and a pool of available disks into a concrete disk
//! assignment.
//!
//! # Selection
//!
//! Manual specs name their disks; the compiler only checks that every named
//! disk is in the pool. Auto specs walk the cross product of the protocol
//! and media type preferences, run single-bucket selection on each
//! homogeneous bucket, and keep the best result. A later bucket only
//! replaces the current best when it is strictly better:
//!
//! - `DiskCount: max`: more disks
//! - `Size: max`: larger footprint
//! - otherwise: smaller footprint (less wasted space)

use super::disk::{BucketKey, VolSpecDisks};
use super::spec::{DiskCount, DiskSelection, SizeRequest, VolSpec, VolSpecRequest};
use crate::error::{Error, Result};
use crate::inventory::DiskPosition;
use crate::raid::{format_size, round_to_stripe};
use tracing::{debug, info};

impl VolSpec {
    /// Pick disks for this spec from `pool`
    ///
    /// On success the spec's Size, Type, and Protocol are rewritten to
    /// describe the chosen disks. The caller decides what to do with the
    /// returned disks; the spec's own disk list is left as is.
    pub fn compile(&mut self, pool: &VolSpecDisks) -> Result<VolSpecDisks> {
        let request = self.fill()?;

        let chosen = match &request.selection {
            DiskSelection::Manual(positions) => compile_manual(pool, positions)?,
            DiskSelection::Auto(count) => compile_auto(&request, *count, pool),
        };
        if chosen.is_empty() {
            return Err(Error::NoDisksAvailable);
        }

        info!(level = %request.level, disks = chosen.len(), "Picked disks");

        self.size = format_size(request.level.final_size(&chosen.sizes()));
        self.disk_type = chosen[0].media_type.to_string();
        self.protocol = chosen[0].protocol.to_string();
        Ok(chosen)
    }
}

fn compile_manual(pool: &VolSpecDisks, positions: &[DiskPosition]) -> Result<VolSpecDisks> {
    debug!("Picking disks directly");
    Ok(pool.select(positions)?.by_pos())
}

fn compile_auto(request: &VolSpecRequest, count: DiskCount, pool: &VolSpecDisks) -> VolSpecDisks {
    debug!("Picking disks heuristically");
    if request.level.is_per_disk() && count == DiskCount::Max {
        debug!(level = %request.level, "Max {}, taking the rest of the disks", request.level);
        return pool.clone();
    }

    let buckets = pool.bucketize();
    let mut best: Option<(BucketKey, VolSpecDisks)> = None;

    for protocol in &request.protocols {
        for media_type in &request.types {
            let key = BucketKey {
                media_type: media_type.clone(),
                protocol: protocol.clone(),
            };
            let candidates = match buckets.get(&key) {
                Some(c) if !c.is_empty() => c,
                _ => continue,
            };

            debug!(bucket = %key, candidates = candidates.len(), "Considering bucket");
            let chosen = compile_one_bucket(request, count, candidates);
            if chosen.is_empty() {
                debug!(bucket = %key, have = candidates.len(), "Not enough disks in bucket");
                continue;
            }

            let replace = match &best {
                None => true,
                Some((best_key, current)) => {
                    let usable = request.level.final_size(&chosen.sizes());
                    let best_usable = request.level.final_size(&current.sizes());
                    if count == DiskCount::Max && chosen.len() > current.len() {
                        debug!(
                            "max disk count wanted, and {} has {} more useable disks than {}",
                            key,
                            chosen.len() - current.len(),
                            best_key
                        );
                        true
                    } else if request.size == SizeRequest::Max && usable > best_usable {
                        debug!(
                            "max size wanted, and {} has {} more useable space than {}",
                            key,
                            format_size(usable - best_usable),
                            best_key
                        );
                        true
                    } else if request.size != SizeRequest::Max
                        && current.footprint() > chosen.footprint()
                    {
                        debug!(
                            "{} wastes {} less space than {}",
                            key,
                            current.footprint() - chosen.footprint(),
                            best_key
                        );
                        true
                    } else {
                        false
                    }
                }
            };
            if replace {
                best = Some((key, chosen));
            }
        }
    }

    match best {
        Some((key, chosen)) => {
            info!(bucket = %key, disks = chosen.len(), "Chose candidates");
            chosen
        }
        None => VolSpecDisks::new(),
    }
}

/// Pick disks from one homogeneous bucket, or nothing if it cannot satisfy the request
fn compile_one_bucket(request: &VolSpecRequest, count: DiskCount, disks: &VolSpecDisks) -> VolSpecDisks {
    let level = request.level;
    let have = disks.len() as u64;

    let wanted = match count {
        DiskCount::Min => level.min_disks(if level.is_spanned() { 2 } else { 1 }),
        DiskCount::Max => level.spans(have).total(),
        DiskCount::Exact(n) => n,
    };
    let geometry = level.spans(wanted);
    let use_disks = geometry.total();
    let min = level.min_disks(geometry.spans);

    if have < min {
        debug!("Not enough disks to make {}: have {}, want at least {}", level, have, min);
        return VolSpecDisks::new();
    }
    if wanted < min || use_disks < min {
        debug!(
            "Want to make a {} with {} disks, but need at least {} disks",
            level, use_disks, min
        );
        return VolSpecDisks::new();
    }
    if use_disks != wanted && count != DiskCount::Max {
        debug!(
            "Want to make a {} with {} disks, but can only use {}",
            level, wanted, use_disks
        );
        return VolSpecDisks::new();
    }
    if use_disks > have {
        debug!(
            "Want to make a {} with {} disks, but only {} available",
            level, use_disks, have
        );
        return VolSpecDisks::new();
    }

    let n = use_disks as usize;
    let by_size = disks.by_size();
    let per_disk = match request.size {
        SizeRequest::Min => by_size.first(n).smallest().unwrap_or(0),
        SizeRequest::Max => by_size.last(n).smallest().unwrap_or(0),
        SizeRequest::Bytes(total) => {
            match round_to_stripe(request.stripe_size, level.per_disk_size(geometry, total)) {
                Some(per_disk) => per_disk,
                None => {
                    debug!(
                        "Want to make a {} of {}, but no disk can hold that much",
                        level,
                        format_size(total)
                    );
                    return VolSpecDisks::new();
                }
            }
        }
    };

    let eligible = by_size.min_size(per_disk).first(n);
    if eligible.len() < n {
        debug!(
            "Want to make a {} with {} disks of at least {}, but only {} available",
            level,
            use_disks,
            format_size(per_disk),
            eligible.len()
        );
        return VolSpecDisks::new();
    }
    eligible.by_pos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{MediaType, Protocol};
    use crate::volspec::VolSpecDisk;
    use assert_matches::assert_matches;

    const MB: u64 = 1 << 20;
    const GB: u64 = 1 << 30;
    const TB: u64 = 1 << 40;

    fn disks(start: u64, count: u64, size: u64, proto: &str, media: &str) -> Vec<VolSpecDisk> {
        (start..start + count)
            .map(|slot| VolSpecDisk {
                size,
                slot,
                media_type: MediaType::from(media),
                protocol: Protocol::from(proto),
                ..Default::default()
            })
            .collect()
    }

    fn pool(groups: Vec<Vec<VolSpecDisk>>) -> VolSpecDisks {
        groups.into_iter().flatten().collect()
    }

    fn slots(disks: &VolSpecDisks) -> Vec<u64> {
        disks.iter().map(|d| d.slot).collect()
    }

    #[test]
    fn test_max_raid6_takes_all_disks() {
        let p = pool(vec![disks(0, 8, 100 * GB, "sas", "ssd")]);
        let mut spec = VolSpec::auto("raid6", "max");
        let chosen = spec.compile(&p).unwrap();

        assert_eq!(chosen.len(), 8);
        assert_eq!(spec.raid_level, "raid6");
        assert_eq!(spec.size, "600.00 GB");
        assert_eq!(spec.disk_type, "ssd");
        assert_eq!(spec.protocol, "sas");
    }

    #[test]
    fn test_min_raid1_uses_smallest_disks() {
        let p = pool(vec![
            disks(0, 4, TB, "sas", "disk"),
            disks(4, 2, 600 * MB, "sas", "disk"),
        ]);
        let mut spec = VolSpec::auto("raid1", "min");
        spec.size = "min".into();
        let chosen = spec.compile(&p).unwrap();
        assert_eq!(slots(&chosen), vec![4, 5]);
        assert_eq!(spec.size, "600.00 MB");
    }

    #[test]
    fn test_max_raid5_with_max_size() {
        let p = pool(vec![
            disks(0, 4, TB, "sas", "disk"),
            disks(4, 2, 600 * MB, "sas", "disk"),
        ]);
        let mut spec = VolSpec::auto("raid5", "max");
        let chosen = spec.compile(&p).unwrap();
        assert_eq!(chosen.len(), 6);
        assert_eq!(spec.size, format_size(5 * 600 * MB));
    }

    #[test]
    fn test_explicit_size_picks_smallest_fitting_disks() {
        let p = pool(vec![
            disks(0, 3, 200 * GB, "sas", "disk"),
            disks(3, 3, 500 * GB, "sas", "disk"),
        ]);
        // 600 GB of raid5 over 3 disks needs 300 GB per disk
        let mut spec = VolSpec::auto("raid5", "3");
        spec.size = "600 GB".into();
        let chosen = spec.compile(&p).unwrap();
        assert_eq!(slots(&chosen), vec![3, 4, 5]);

        // 400 GB fits on the 200 GB disks
        let mut spec = VolSpec::auto("raid5", "3");
        spec.size = "400 GB".into();
        let chosen = spec.compile(&p).unwrap();
        assert_eq!(slots(&chosen), vec![0, 1, 2]);

        let mut spec = VolSpec::auto("raid5", "3");
        spec.size = "2 TB".into();
        assert_matches!(spec.compile(&p), Err(Error::NoDisksAvailable));
    }

    #[test]
    fn test_explicit_size_on_stripe_boundary() {
        let p = pool(vec![disks(0, 4, 100 * GB, "sas", "disk")]);
        let mut spec = VolSpec::auto("raid1", "min");
        spec.size = (100 * GB).to_string();
        assert_eq!(slots(&spec.compile(&p).unwrap()), vec![0, 1]);

        // One byte over rounds up a whole stripe past the disk size
        let mut spec = VolSpec::auto("raid1", "min");
        spec.size = (100 * GB + 1).to_string();
        assert_matches!(spec.compile(&p), Err(Error::NoDisksAvailable));
    }

    #[test]
    fn test_explicit_size_near_u64_ceiling() {
        let p = pool(vec![disks(0, 4, 100 * GB, "sas", "disk")]);
        let mut spec = VolSpec::auto("raid1", "min");
        spec.size = "16384 PB".into();
        assert_matches!(spec.compile(&p), Err(Error::InvalidSize(_)));

        for level in ["raid1", "jbod"] {
            let mut spec = VolSpec::auto(level, "min");
            spec.size = u64::MAX.to_string();
            assert_matches!(spec.compile(&p), Err(Error::NoDisksAvailable));
        }
    }

    #[test]
    fn test_max_size_ranks_buckets_by_usable_bytes() {
        let p = pool(vec![
            disks(0, 4, 1000 * GB, "nvme", "ssd"),
            disks(4, 3, 1400 * GB, "nvme", "disk"),
        ]);
        // 4 x 1000 GB raid5 holds 3000 GB, 3 x 1400 GB only 2800 GB
        let mut spec = VolSpec::auto("raid5", "max");
        spec.size = "max".into();
        spec.disk_type = "ssd,disk".into();
        spec.protocol = "nvme,sas,sata".into();
        let chosen = spec.compile(&p).unwrap();
        assert_eq!(slots(&chosen), vec![0, 1, 2, 3]);
        assert_eq!(spec.disk_type, "ssd");
        assert_eq!(spec.size, format_size(3000 * GB));

        // Without parity the larger raw bucket also holds more
        let mut spec = VolSpec::auto("raid0", "3");
        spec.size = "max".into();
        spec.disk_type = "ssd,disk".into();
        spec.protocol = "nvme,sas,sata".into();
        assert_eq!(slots(&spec.compile(&p).unwrap()), vec![4, 5, 6]);
    }

    #[test]
    fn test_exact_count_must_fit_geometry() {
        let p = pool(vec![disks(0, 8, 100 * GB, "sas", "disk")]);
        let mut spec = VolSpec::auto("raid10", "5");
        assert_matches!(spec.compile(&p), Err(Error::NoDisksAvailable));

        let mut spec = VolSpec::auto("raid10", "6");
        assert_eq!(spec.compile(&p).unwrap().len(), 6);

        let mut spec = VolSpec::auto("raid0", "9");
        assert_matches!(spec.compile(&p), Err(Error::NoDisksAvailable));
    }

    #[test]
    fn test_min_spanned_level() {
        let p = pool(vec![disks(0, 8, 100 * GB, "sas", "disk")]);
        let mut spec = VolSpec::auto("raid60", "min");
        assert_eq!(spec.compile(&p).unwrap().len(), 8);

        let mut spec = VolSpec::auto("raid50", "min");
        assert_eq!(slots(&spec.compile(&p).unwrap()), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_per_disk_max_takes_whole_pool() {
        let p = pool(vec![
            disks(0, 2, 100 * GB, "sas", "disk"),
            disks(2, 2, 200 * GB, "nvme", "ssd"),
        ]);
        for level in ["jbod", "raidS"] {
            let mut spec = VolSpec::auto(level, "max");
            assert_eq!(spec.compile(&p).unwrap().len(), 4);
        }
    }

    #[test]
    fn test_bucket_preference_order() {
        let p = pool(vec![
            disks(0, 2, 100 * GB, "sas", "disk"),
            disks(2, 2, 100 * GB, "nvme", "ssd"),
        ]);
        // equal footprints: the first preferred bucket wins
        let mut spec = VolSpec::auto("raid1", "min");
        let chosen = spec.compile(&p).unwrap();
        assert_eq!(slots(&chosen), vec![2, 3]);
        assert_eq!(spec.protocol, "nvme");

        let mut spec = VolSpec::auto("raid1", "min");
        spec.protocol = "sas,sata".into();
        assert_eq!(slots(&spec.compile(&p).unwrap()), vec![0, 1]);
    }

    #[test]
    fn test_buckets_never_mix() {
        let p = pool(vec![
            disks(0, 2, 100 * GB, "sas", "disk"),
            disks(2, 2, 100 * GB, "sata", "disk"),
        ]);
        let mut spec = VolSpec::auto("raid5", "min");
        assert_matches!(spec.compile(&p), Err(Error::NoDisksAvailable));
    }

    #[test]
    fn test_max_count_prefers_more_disks() {
        let p = pool(vec![
            disks(0, 3, TB, "nvme", "ssd"),
            disks(3, 5, 100 * GB, "sas", "disk"),
        ]);
        let mut spec = VolSpec::auto("raid5", "max");
        let chosen = spec.compile(&p).unwrap();
        assert_eq!(slots(&chosen), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_max_size_prefers_bigger_footprint() {
        let p = pool(vec![
            disks(0, 2, 100 * GB, "nvme", "ssd"),
            disks(2, 2, TB, "sas", "disk"),
        ]);
        let mut spec = VolSpec::auto("raid1", "min");
        spec.size = "max".into();
        assert_eq!(slots(&spec.compile(&p).unwrap()), vec![2, 3]);

        let mut spec = VolSpec::auto("raid1", "min");
        spec.size = "min".into();
        assert_eq!(slots(&spec.compile(&p).unwrap()), vec![0, 1]);
    }

    #[test]
    fn test_manual_selection() {
        let p = pool(vec![disks(0, 4, 100 * GB, "sas", "disk")]);
        let mut spec = VolSpec {
            raid_level: "raid1".into(),
            disks: pool(vec![disks(3, 1, 0, "", ""), disks(1, 1, 0, "", "")]),
            ..Default::default()
        };
        let chosen = spec.compile(&p).unwrap();
        assert_eq!(slots(&chosen), vec![1, 3]);
        assert_eq!(chosen[0].size, 100 * GB);
        assert_eq!(spec.size, "100.00 GB");
    }

    #[test]
    fn test_manual_missing_disk() {
        let p = pool(vec![disks(0, 2, 100 * GB, "sas", "disk")]);
        let mut spec = VolSpec {
            raid_level: "raid1".into(),
            disks: pool(vec![disks(1, 2, 0, "", "")]),
            ..Default::default()
        };
        assert_matches!(spec.compile(&p), Err(Error::DiskNotFound { position }) if position == "2");
    }

    #[test]
    fn test_manual_raid10_with_three_disks_fails() {
        let p = pool(vec![disks(0, 4, 100 * GB, "sas", "disk")]);
        let mut spec = VolSpec {
            raid_level: "raid10".into(),
            disks: pool(vec![disks(0, 3, 0, "", "")]),
            ..Default::default()
        };
        assert_matches!(spec.compile(&p), Err(Error::Geometry { .. }));
    }

    #[test]
    fn test_empty_pool() {
        let mut spec = VolSpec::auto("jbod", "max");
        assert_matches!(spec.compile(&VolSpecDisks::new()), Err(Error::NoDisksAvailable));
    }
}

//! Test fixtures for building controller snapshots

use super::snapshot::{ControllerRecord, DiskRecord};
use super::types::{MediaType, Protocol};

pub const MB: u64 = 1 << 20;
pub const GB: u64 = 1 << 30;
pub const TB: u64 = 1 << 40;

/// `count` empty controllers for one driver, one PCI device apart
pub fn controllers(count: usize, driver: &str) -> Vec<ControllerRecord> {
    (0..count)
        .map(|i| {
            let mut c = ControllerRecord {
                id: i.to_string(),
                driver: driver.to_string(),
                jbod_capable: true,
                raid_capable: true,
                raid_levels: ["raid0", "raid1", "raid5", "raid6", "raid00", "raid10", "raid50", "raid60"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                ..Default::default()
            };
            c.pci.device = i as i64;
            c
        })
        .collect()
}

/// Append `count` good disks with consecutive slots
pub fn with_disks(
    mut controller: ControllerRecord,
    count: usize,
    size: u64,
    protocol: &str,
    media_type: &str,
) -> ControllerRecord {
    let start = controller.disks.len() as u64;
    for i in 0..count as u64 {
        controller.disks.push(DiskRecord {
            controller_id: controller.id.clone(),
            controller_driver: controller.driver.clone(),
            size: (size >> 8) << 8,
            sector_count: size >> 8,
            physical_sector_size: 512,
            logical_sector_size: 512,
            slot: start + i,
            protocol: Protocol::from(protocol),
            media_type: MediaType::from(media_type),
            status: "good".to_string(),
            ..Default::default()
        });
    }
    controller
}

/// One controller with `count` identical disks
pub fn single(driver: &str, count: usize, size: u64, protocol: &str, media_type: &str) -> ControllerRecord {
    let controller = controllers(1, driver).remove(0);
    with_disks(controller, count, size, protocol, media_type)
}

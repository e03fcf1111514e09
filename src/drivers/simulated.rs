//! Simulated Driver
//!
//! An in-memory [`Driver`] over a set of controller snapshots. Sessions
//! started from a `--controller` file bind to it, and tests use it to drive
//! the full scan/compile/apply/rescan cycle without hardware.

use crate::domain::ports::Driver;
use crate::error::{Error, Result};
use crate::inventory::{ControllerRecord, DiskPosition, VolumeRecord};
use crate::raid::{parse_size, RaidLevel};
use crate::volspec::{VolSpec, DEFAULT_STRIPE_SIZE};
use parking_lot::RwLock;
use std::path::PathBuf;
use tracing::{debug, info};

const GOOD: &str = "good";

/// Driver backed by controller snapshots held in memory
pub struct SimulatedDriver {
    name: String,
    order: i32,
    useable: bool,
    controllers: RwLock<Vec<ControllerRecord>>,
}

impl SimulatedDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: 100,
            useable: true,
            controllers: RwLock::new(Vec::new()),
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_useable(mut self, useable: bool) -> Self {
        self.useable = useable;
        self
    }

    /// Seed the controllers this driver reports
    pub fn with_controllers(self, controllers: Vec<ControllerRecord>) -> Self {
        let name = self.name.clone();
        *self.controllers.write() = controllers
            .into_iter()
            .map(|mut c| {
                c.driver = name.clone();
                c
            })
            .collect();
        self
    }

    fn error(&self, operation: &str, reason: impl Into<String>) -> Error {
        Error::driver(&self.name, operation, reason)
    }

    fn with_controller<T>(
        &self,
        operation: &str,
        id: &str,
        f: impl FnOnce(&mut ControllerRecord) -> Result<T>,
    ) -> Result<T> {
        let mut controllers = self.controllers.write();
        let controller = controllers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| self.error(operation, format!("no controller {}", id)))?;
        f(controller)
    }

    fn in_use(controller: &ControllerRecord, position: &DiskPosition) -> bool {
        controller
            .volumes
            .iter()
            .any(|v| v.disks.iter().any(|d| &d.position() == position))
    }
}

impl Driver for SimulatedDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn executable(&self) -> Option<PathBuf> {
        None
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn useable(&self) -> bool {
        self.useable
    }

    fn controllers(&self) -> Result<Vec<ControllerRecord>> {
        Ok(self.controllers.read().clone())
    }

    fn refresh(&self, controller: &mut ControllerRecord) -> Result<()> {
        let controllers = self.controllers.read();
        let current = controllers
            .iter()
            .find(|c| c.id == controller.id)
            .ok_or_else(|| self.error("refresh", format!("no controller {}", controller.id)))?;
        *controller = current.clone();
        Ok(())
    }

    fn clear(&self, controller: &ControllerRecord, foreign_only: bool) -> Result<()> {
        self.with_controller("clear", &controller.id, |c| {
            let before = c.volumes.len();
            c.volumes.retain(|v| {
                let foreign = v.info.get("Foreign").map(String::as_str) == Some("true");
                if foreign_only {
                    !foreign
                } else {
                    v.fake
                }
            });
            let kept: Vec<DiskPosition> = c
                .volumes
                .iter()
                .flat_map(|v| v.disks.iter().map(|d| d.position()))
                .collect();
            for disk in c.disks.iter_mut() {
                if !kept.contains(&disk.position()) {
                    disk.volume_id.clear();
                }
            }
            info!(
                controller = %c.name(),
                removed = before - c.volumes.len(),
                foreign_only,
                "Cleared volumes"
            );
            Ok(())
        })
    }

    fn create(&self, controller: &ControllerRecord, spec: &VolSpec, force_good: bool) -> Result<()> {
        if !spec.is_compiled() {
            return Err(Error::NotCompiled { key: spec.key() });
        }
        let level: RaidLevel = spec.raid_level.parse()?;
        let geometry = level.check_disk_count(spec.disks.len() as u64)?;
        let stripe_size = if spec.stripe_size.is_empty() {
            parse_size(DEFAULT_STRIPE_SIZE)?
        } else {
            parse_size(&spec.stripe_size)?
        };

        self.with_controller("create", &controller.id, |c| {
            let mut members = Vec::with_capacity(spec.disks.len());
            for wanted in spec.disks.iter() {
                let position = wanted.position();
                if Self::in_use(c, &position) {
                    return Err(self.error("create", format!("disk {} is already in use", position)));
                }
                let disk = c
                    .disk_at(&position)
                    .ok_or_else(|| Error::DiskNotFound {
                        position: position.to_string(),
                    })?;
                if !disk.status.eq_ignore_ascii_case(GOOD) && !force_good {
                    return Err(self.error(
                        "create",
                        format!("disk {} is {}, not good", position, disk.status),
                    ));
                }
                members.push(position);
            }

            if level == RaidLevel::Jbod {
                for position in &members {
                    if let Some(disk) = c.disk_at_mut(position) {
                        disk.status = GOOD.to_string();
                        disk.jbod = true;
                    }
                    if let Some(disk) = c.disk_at(position).cloned() {
                        c.add_jbod_volume(&disk);
                    }
                }
                debug!(controller = %c.name(), disks = members.len(), "Exposed JBOD disks");
                return Ok(());
            }

            // JBOD volumes are named after their disk, so keep RAID ids apart
            let id = format!("vd{}", spec.index());
            let mut disks = Vec::with_capacity(members.len());
            for position in &members {
                if let Some(disk) = c.disk_at_mut(position) {
                    disk.status = GOOD.to_string();
                    disk.volume_id = id.clone();
                    disks.push(disk.clone());
                }
            }
            let sizes: Vec<u64> = disks.iter().map(|d| d.size).collect();

            let mut volume = VolumeRecord {
                controller_id: c.id.clone(),
                controller_driver: c.driver.clone(),
                id: id.clone(),
                name: spec.name.clone(),
                status: "Optimal".to_string(),
                raid_level: level.to_string(),
                size: level.final_size(&sizes),
                stripe_size,
                spans: geometry.spans,
                span_length: geometry.disks_per_span,
                disks,
                ..Default::default()
            };
            if spec.bootable {
                volume.info.insert("Bootable".to_string(), "true".to_string());
            }
            if spec.encrypt {
                volume.info.insert("Encrypted".to_string(), "true".to_string());
            }
            info!(controller = %c.name(), volume = %id, level = %level, "Created volume");
            c.volumes.push(volume);
            Ok(())
        })
    }

    fn encrypt(&self, controller: &ControllerRecord, key: &str, password: &str) -> Result<()> {
        if key.is_empty() || password.is_empty() {
            return Err(self.error("encrypt", "a key and password are required"));
        }
        self.with_controller("encrypt", &controller.id, |c| {
            c.info.insert("Encryption".to_string(), "enabled".to_string());
            for volume in c.volumes.iter_mut().filter(|v| !v.fake) {
                volume.info.insert("Encrypted".to_string(), "true".to_string());
            }
            Ok(())
        })
    }
}

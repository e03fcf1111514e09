//! Session Orchestrator
//!
//! One run of the tool: load controllers, read the wanted VolSpecs, compile
//! them, diff against the hardware and apply the additions.
//!
//! ```text
//! load_controllers -> read_wanted -> compile -> diff -> configure
//! ```
//!
//! Only additions are ever applied. Destroying volumes goes through the
//! separate [`Session::clear`] operation.

use super::config::SessionConfig;
use super::diff::VolSpecDiff;
use crate::domain::ports::DriverRef;
use crate::drivers::DriverRegistry;
use crate::error::{Error, Result};
use crate::inventory::{load_controllers, ControllerRecord, Inventory};
use crate::volspec::{VolSpec, VolSpecs};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Read;
use tracing::{debug, error, info, warn};

// =============================================================================
// Error Log
// =============================================================================

/// Errors collected during a session
///
/// A fatal error marks the log aborted; loops over controllers and specs
/// stop at the first one.
#[derive(Debug, Default)]
pub struct ErrorLog {
    errors: Vec<Error>,
    aborted: bool,
}

impl ErrorLog {
    pub fn record(&mut self, err: Error) {
        let fatal = err.is_fatal();
        error!(category = ?err.category(), fatal, "{}", err);
        self.aborted |= fatal;
        self.errors.push(err);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

// =============================================================================
// Apply Report
// =============================================================================

/// What happened to one spec during apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "error")]
pub enum ApplyOutcome {
    Created,
    /// Logged only, nothing sent to the driver
    DryRun,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyEntry {
    pub key: String,
    pub controller: usize,
    pub raid_level: String,
    /// Creation index handed to the driver
    pub index: usize,
    pub outcome: ApplyOutcome,
    pub at: DateTime<Utc>,
}

/// Record of a [`Session::configure`] run
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<ApplyEntry>,
}

impl ApplyReport {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            entries: Vec::new(),
        }
    }

    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, ApplyOutcome::Failed(_)))
            .count()
    }

    pub fn created(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == ApplyOutcome::Created)
            .count()
    }
}

// =============================================================================
// Session
// =============================================================================

/// State of one configuration run
pub struct Session {
    config: SessionConfig,
    registry: DriverRegistry,
    inventory: Inventory,
    /// Driver for each controller, indexed like the inventory
    bindings: Vec<Option<DriverRef>>,
    wanted: Option<VolSpecs>,
    compiled: Option<VolSpecs>,
    errors: ErrorLog,
}

impl Session {
    pub fn new(config: SessionConfig, mut registry: DriverRegistry) -> Self {
        config.apply_to(&mut registry);
        Self {
            config,
            registry,
            inventory: Inventory::default(),
            bindings: Vec::new(),
            wanted: None,
            compiled: None,
            errors: ErrorLog::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn compiled(&self) -> Option<&VolSpecs> {
        self.compiled.as_ref()
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        self.errors.has_errors()
    }

    /// Current controllers in wire form
    pub fn controller_records(&self) -> Vec<ControllerRecord> {
        self.inventory.to_records()
    }

    /// Populate the inventory
    ///
    /// With a `controller_file` the snapshot is read in file order and each
    /// controller is bound to the registered driver named in its `Driver`
    /// field. Otherwise every usable driver is probed.
    pub fn load_controllers(&mut self) -> Result<()> {
        let (records, bindings): (Vec<_>, Vec<_>) = match &self.config.controller_file {
            Some(path) => {
                let records = load_controllers(path)?;
                info!(
                    path = %path.display(),
                    controllers = records.len(),
                    "Loaded controllers from file"
                );
                records
                    .into_iter()
                    .map(|record| {
                        let driver = self.registry.get(&record.driver);
                        if driver.is_none() {
                            warn!(controller = %record.name(), "No registered driver for controller");
                        }
                        (record, driver)
                    })
                    .unzip()
            }
            None => self
                .registry
                .discover()
                .into_iter()
                .map(|d| (d.record, Some(d.driver)))
                .unzip(),
        };
        self.inventory = Inventory::from_records(records);
        self.bindings = bindings;
        Ok(())
    }

    /// Parse wanted VolSpecs from JSON; `null` means no specs
    pub fn read_wanted<R: Read>(&mut self, reader: R) -> Result<()> {
        let specs: Option<VolSpecs> = serde_json::from_reader(reader)?;
        self.set_wanted(specs.unwrap_or_default());
        Ok(())
    }

    pub fn set_wanted(&mut self, specs: VolSpecs) {
        debug!(specs = specs.len(), "Wanted specs set");
        self.wanted = Some(specs);
        self.compiled = None;
    }

    /// Existing volumes as VolSpecs
    pub fn current_specs(&self, specific: bool) -> VolSpecs {
        self.inventory.to_volspecs(specific)
    }

    /// Compile the wanted specs against the inventory
    ///
    /// Per-spec failures are recorded and the rest of the batch compiles.
    pub fn compile(&mut self) {
        let wanted = match &self.wanted {
            Some(specs) if !specs.is_empty() => specs,
            _ => {
                info!("No volspecs present to compile from");
                self.compiled = Some(VolSpecs::new());
                return;
            }
        };
        let outcome = wanted.compile(&self.inventory);
        for failure in outcome.failures {
            warn!(position = failure.position, level = %failure.raid_level, "VolSpec did not compile");
            self.errors.record(failure.error);
        }
        self.compiled = Some(outcome.compiled);
    }

    /// Diff the hardware against the compiled specs
    pub fn diff(&self) -> Result<VolSpecDiff> {
        let compiled = self.compiled.as_ref().ok_or(Error::CompileRequired)?;
        Ok(VolSpecDiff::compute(&self.current_specs(true), compiled))
    }

    /// Compile, diff and create every missing volume
    ///
    /// In append mode existing volumes are prepended to the wanted specs so
    /// they claim their disks first. Refuses to run when the diff would remove
    /// a volume. Creation failures are recorded and do not stop the run,
    /// unless the error is fatal.
    pub fn configure(&mut self, append: bool) -> ApplyReport {
        let mut report = ApplyReport::start();
        if self.has_errors() {
            warn!("Errors already recorded, not configuring");
            return report;
        }

        if append {
            let mut specs = self.current_specs(true);
            specs.extend(self.wanted.take().unwrap_or_default());
            self.set_wanted(specs);
        }
        self.compile();
        if self.has_errors() {
            return report;
        }

        let diff = match self.diff() {
            Ok(diff) => diff,
            Err(e) => {
                self.errors.record(e);
                return report;
            }
        };
        if !diff.rm.is_empty() {
            for spec in diff.rm.iter() {
                warn!(key = %spec.key(), "Volume is not wanted");
            }
            self.errors.record(Error::RemovalRefused { count: diff.rm.len() });
            return report;
        }
        if diff.add.is_empty() {
            info!("All volumes already present, nothing to do");
            report.finished_at = Utc::now();
            return report;
        }

        let base = diff.current.len();
        for (i, mut spec) in diff.add.into_iter().enumerate() {
            spec.index = base + i;
            let outcome = match self.create(&spec) {
                Ok(outcome) => outcome,
                Err(e) => {
                    let outcome = ApplyOutcome::Failed(e.to_string());
                    self.errors.record(e);
                    outcome
                }
            };
            report.entries.push(ApplyEntry {
                key: spec.key(),
                controller: spec.controller,
                raid_level: spec.raid_level.clone(),
                index: spec.index,
                outcome,
                at: Utc::now(),
            });
            if self.errors.is_aborted() {
                warn!("Stopping after a fatal error");
                break;
            }
        }

        if !self.config.dry_run {
            self.rescan();
        }

        let failed = report.failed();
        if failed > 0 {
            self.errors.record(Error::ApplyFailed {
                failed,
                attempted: report.entries.len(),
            });
        }
        report.finished_at = Utc::now();
        info!(
            created = report.created(),
            failed,
            attempted = report.entries.len(),
            "Configure finished"
        );
        report
    }

    /// Fatal errors are returned, everything else becomes a failed outcome
    fn create(&self, spec: &VolSpec) -> Result<ApplyOutcome> {
        let key = spec.key();
        if self.config.dry_run {
            info!(key = %key, index = spec.index(), "Dry run, would create volume");
            return Ok(ApplyOutcome::DryRun);
        }

        let result = match (self.binding(spec.controller), self.inventory.controller_record(spec.controller)) {
            (Ok(driver), Some(record)) => driver.create(&record, spec, self.config.force_good),
            (Err(e), _) => Err(e),
            (_, None) => Err(Error::ControllerNotFound {
                index: spec.controller,
            }),
        };
        match result {
            Ok(()) => {
                info!(key = %key, index = spec.index(), "Created volume");
                Ok(ApplyOutcome::Created)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                let reason = e.to_string();
                error!(key = %key, "Failed to create volume: {}", reason);
                Ok(ApplyOutcome::Failed(reason))
            }
        }
    }

    fn binding(&self, idx: usize) -> Result<DriverRef> {
        self.bindings.get(idx).cloned().flatten().ok_or_else(|| {
            Error::NoDriverBound {
                controller: self
                    .inventory
                    .controller(idx)
                    .map(|c| c.name())
                    .unwrap_or_else(|| idx.to_string()),
            }
        })
    }

    /// Run `op` against every controller's driver, recording failures
    fn each_controller(&mut self, op: &str, mut f: impl FnMut(&DriverRef, &ControllerRecord) -> Result<()>) {
        for idx in 0..self.inventory.len() {
            let Some(record) = self.inventory.controller_record(idx) else {
                continue;
            };
            let result = self.binding(idx).and_then(|driver| f(&driver, &record));
            match result {
                Ok(()) => debug!(controller = %record.name(), op, "Controller operation done"),
                Err(e) => self.errors.record(e),
            }
            if self.errors.is_aborted() {
                warn!(op, "Stopping after a fatal error");
                break;
            }
        }
    }

    /// Drop local volume configuration on every controller
    pub fn clear(&mut self) {
        if self.config.dry_run {
            info!("Dry run, not clearing controllers");
            return;
        }
        self.each_controller("clear", |driver, record| driver.clear(record, false));
        self.rescan();
    }

    /// Clear every controller, then enable encryption on it
    pub fn encrypt(&mut self, key: &str, password: &str) {
        if self.config.dry_run {
            info!("Dry run, not encrypting controllers");
            return;
        }
        self.each_controller("encrypt", |driver, record| {
            driver.clear(record, false)?;
            driver.encrypt(record, key, password)
        });
        self.rescan();
    }

    /// Re-read every controller from its driver
    ///
    /// Controllers without a driver, or whose refresh fails, keep their last
    /// known state.
    pub fn rescan(&mut self) {
        let mut records = Vec::with_capacity(self.inventory.len());
        for idx in 0..self.inventory.len() {
            let Some(mut record) = self.inventory.controller_record(idx) else {
                continue;
            };
            if let Ok(driver) = self.binding(idx) {
                if let Err(e) = driver.refresh(&mut record) {
                    warn!(controller = %record.name(), "Refresh failed: {}", e);
                }
            }
            records.push(record);
        }
        self.inventory = Inventory::from_records(records);
        debug!(controllers = self.inventory.len(), "Rescanned controllers");
    }
}

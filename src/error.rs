//! Error types for drp-raid
//!
//! Provides structured error types for VolSpec validation, disk selection,
//! driver interaction, and session orchestration.

use thiserror::Error;

/// Unified error type for the RAID configurator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Raid level '{0}' is not supported")]
    InvalidRaidLevel(String),

    #[error("Size error: {0}")]
    InvalidSize(String),

    #[error("Invalid stripe size '{value}': {reason}")]
    InvalidStripeSize { value: String, reason: String },

    #[error("Cannot have Disks and DiskCount set in the same VolSpec")]
    ConflictingDiskSelection,

    #[error("DiskCount must be one of `min`,`max`, or a positive integer, not `{0}`")]
    InvalidDiskCount(String),

    #[error("'{0}' is not a valid disk type")]
    InvalidDiskType(String),

    #[error("'{0}' is not a valid disk protocol")]
    InvalidProtocol(String),

    #[error("Raid level {level} {reason}")]
    Geometry { level: String, reason: String },

    // =========================================================================
    // Compile Errors
    // =========================================================================
    #[error("Disk {position} is not present on the controller")]
    DiskNotFound { position: String },

    #[error("No disks available")]
    NoDisksAvailable,

    #[error("Controller {index} not found")]
    ControllerNotFound { index: usize },

    // =========================================================================
    // Driver Errors
    // =========================================================================
    #[error("{driver}: {executable} is not present or not executable")]
    DriverNotInstalled { driver: String, executable: String },

    #[error("{driver}: not useable")]
    DriverUnavailable { driver: String },

    #[error("{driver}: {operation} failed: {reason}")]
    DriverCommand {
        driver: String,
        operation: String,
        reason: String,
    },

    #[error("No driver bound to controller {controller}")]
    NoDriverBound { controller: String },

    #[error("Failed to create {failed} of {attempted} volumes")]
    ApplyFailed { failed: usize, attempted: usize },

    // =========================================================================
    // State Errors
    // =========================================================================
    #[error("VolSpec {key} has not been compiled")]
    NotCompiled { key: String },

    #[error("Must Compile wanted specs first")]
    CompileRequired,

    #[error("Cannot remove volumes using configure: {count} volume(s) would be removed")]
    RemovalRefused { count: usize },

    // =========================================================================
    // Process Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad class an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed VolSpec
    Validation,
    /// Disks could not be picked for a VolSpec
    Compile,
    /// Hardware tooling failed
    Driver,
    /// Operation invoked in the wrong session state
    State,
    /// Unreadable input or output; aborts the run
    Process,
}

impl Error {
    /// Determine which category this error falls into
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidRaidLevel(_)
            | Error::InvalidSize(_)
            | Error::InvalidStripeSize { .. }
            | Error::ConflictingDiskSelection
            | Error::InvalidDiskCount(_)
            | Error::InvalidDiskType(_)
            | Error::InvalidProtocol(_)
            | Error::Geometry { .. } => ErrorCategory::Validation,

            Error::DiskNotFound { .. }
            | Error::NoDisksAvailable
            | Error::ControllerNotFound { .. } => ErrorCategory::Compile,

            Error::DriverNotInstalled { .. }
            | Error::DriverUnavailable { .. }
            | Error::DriverCommand { .. }
            | Error::NoDriverBound { .. }
            | Error::ApplyFailed { .. } => ErrorCategory::Driver,

            Error::NotCompiled { .. } | Error::CompileRequired | Error::RemovalRefused { .. } => {
                ErrorCategory::State
            }

            Error::Configuration(_) | Error::JsonParse(_) | Error::YamlParse(_) | Error::Io(_) => {
                ErrorCategory::Process
            }
        }
    }

    /// Process-level failures abort the run instead of being recorded
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Process
    }

    /// Shorthand for a failed driver operation
    pub fn driver(driver: &str, operation: &str, reason: impl Into<String>) -> Self {
        Error::DriverCommand {
            driver: driver.to_string(),
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for drp-raid
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = Error::InvalidRaidLevel("jjbod".into());
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert_eq!(err.to_string(), "Raid level 'jjbod' is not supported");

        let err = Error::NoDisksAvailable;
        assert_eq!(err.category(), ErrorCategory::Compile);

        let err = Error::driver("megacli", "create", "exit status 1");
        assert_eq!(err.category(), ErrorCategory::Driver);
        assert_eq!(err.to_string(), "megacli: create failed: exit status 1");

        let err = Error::NotCompiled { key: "0:raid1".into() };
        assert_eq!(err.category(), ErrorCategory::State);
    }

    #[test]
    fn test_only_process_errors_are_fatal() {
        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io.is_fatal());

        assert!(!Error::RemovalRefused { count: 1 }.is_fatal());
        assert!(!Error::ConflictingDiskSelection.is_fatal());
        assert!(!Error::DriverUnavailable { driver: "ssacli".into() }.is_fatal());
    }
}

//! Unified error types for the cloudstor-mount-core library.
//!
//! Uses SNAFU so that the same underlying `std::io::Error` can be reported
//! with the file and the step of the atomic replace it came from.

use snafu::{ResultExt, Snafu};
use std::path::PathBuf;

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all core library operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Fstab file not found or cannot be read.
    #[snafu(display("failed to read fstab at {}", path.display()))]
    FstabRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to create or fill the temporary file that replaces a file.
    #[snafu(display("failed to write {}", path.display()))]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read or apply permission bits.
    #[snafu(display("failed to copy permissions of {}", path.display()))]
    Permissions {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to refresh the hard-link backup.
    #[snafu(display("failed to create backup at {}", path.display()))]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to move the temporary file onto its destination.
    #[snafu(display("failed to rename temporary file onto {}", path.display()))]
    Rename {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A structured field was accessed on a line without a filesystem specification.
    #[snafu(display("cannot access {field}: line has no filesystem specification"))]
    NoFilesystem { field: &'static str },

    /// A stored numeric column does not fit in an integer.
    #[snafu(display("{field} value '{value}' is out of range"))]
    NumericField { field: &'static str, value: String },

    /// davfs2 secrets file cannot be read.
    #[snafu(display("failed to read secrets file at {}", path.display()))]
    SecretsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Mount point creation failed.
    #[snafu(display("failed to create mount point at {}", path.display()))]
    MountPointCreation {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to execute a system command.
    #[snafu(display("failed to execute command '{command}'"))]
    CommandExecution {
        command: String,
        source: std::io::Error,
    },

    /// Mount command executed but returned non-zero exit code.
    #[snafu(display("failed to mount {}: {message}", path.display()))]
    Mount { path: PathBuf, message: String },

    #[snafu(whatever, display("{message}"))]
    Generic {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

/// Extension trait for adding context to io::Error results.
pub trait IoResultExt<T> {
    /// Add context for command execution errors.
    fn command_context(self, command: impl Into<String>) -> Result<T>;

    /// Add context for fstab read errors.
    fn fstab_read_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for errors while filling the replacement file.
    fn write_context(self, path: impl Into<PathBuf>) -> Result<T>;

    fn permissions_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for backup errors.
    fn backup_context(self, path: impl Into<PathBuf>) -> Result<T>;

    fn rename_context(self, path: impl Into<PathBuf>) -> Result<T>;

    fn secrets_read_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for mount point creation errors.
    fn mount_point_context(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn command_context(self, command: impl Into<String>) -> Result<T> {
        self.context(CommandExecutionSnafu {
            command: command.into(),
        })
    }

    fn fstab_read_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(FstabReadSnafu { path: path.into() })
    }

    fn write_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(FileWriteSnafu { path: path.into() })
    }

    fn permissions_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(PermissionsSnafu { path: path.into() })
    }

    fn backup_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(BackupSnafu { path: path.into() })
    }

    fn rename_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(RenameSnafu { path: path.into() })
    }

    fn secrets_read_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(SecretsReadSnafu { path: path.into() })
    }

    fn mount_point_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(MountPointCreationSnafu { path: path.into() })
    }
}

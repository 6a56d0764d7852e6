//! Mount point helpers.
//!
//! The actual mount is left to `mount(8)`, which looks the mount point up in
//! fstab; this module only prepares the directory and reports the outcome.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::process::Command;

use log::info;

use crate::error::{Error, IoResultExt, Result};

/// Creates a mount point directory if it doesn't exist.
pub fn create_mount_point(path: &Path) -> Result<()> {
    if !path.exists() {
        info!("Creating mount point {}", path.display());
        fs::create_dir_all(path).mount_point_context(path)?;
    }
    Ok(())
}

/// Checks whether `path` is currently a mount point.
///
/// A path is a mount point when it sits on a different device than its
/// parent, or is its own parent (`/`). Missing paths and symlinks are not.
pub fn is_mounted(path: &Path) -> bool {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return false;
    };
    if meta.file_type().is_symlink() {
        return false;
    }
    let Ok(parent) = fs::metadata(path.join("..")) else {
        return false;
    };

    meta.dev() != parent.dev() || meta.ino() == parent.ino()
}

/// Mounts the fstab entry for `mount_point` by running `mount <mount_point>`.
pub fn mount_fstab_entry(mount_point: &Path) -> Result<()> {
    info!("Mounting {}", mount_point.display());

    let output = Command::new("mount")
        .arg(mount_point)
        .output()
        .command_context("mount")?;

    if !output.status.success() {
        let mut message = String::from_utf8_lossy(&output.stdout).to_string();
        message.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(Error::Mount {
            path: mount_point.to_path_buf(),
            message: message.trim().to_string(),
        });
    }

    Ok(())
}

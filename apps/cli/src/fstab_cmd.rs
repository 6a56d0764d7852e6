//! `cloudstor-agent fstab ...` subcommands.

use std::path::Path;

use clap::Subcommand;
use cloudstor_mount_core::fstab::{escape_fstab_field, unescape_fstab_field};
use cloudstor_mount_core::{FilesystemEntry, Fstab, Result};
use log::info;
use snafu::ResultExt;

#[derive(Debug, Subcommand)]
pub enum FstabCommand {
    /// List filesystem entries.
    List {
        /// Print entries as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show the entry for a mount point.
    ///
    /// The mount point may be given plain (`/mnt/My Share`) or as written in
    /// fstab (`/mnt/My\040Share`).
    Get { mount_point: String },
    /// Add or replace the entry for a mount point.
    Add {
        device: String,
        mount_point: String,
        fs_type: String,
        /// Comma-separated mount options.
        options: String,
        #[arg(long, default_value_t = 0)]
        dump: u32,
        #[arg(long, default_value_t = 0)]
        fsck: u32,
    },
    /// Remove the first entry for a mount point.
    ///
    /// Accepts the same plain or fstab-escaped forms as `get`.
    Remove { mount_point: String },
}

/// Runs a table command against the fstab at `path`.
///
/// Returns false when a looked-up mount point has no entry.
pub fn run(path: &Path, command: FstabCommand) -> Result<bool> {
    let mut fstab = Fstab::open(path)?;

    match command {
        FstabCommand::List { json } => {
            let entries: Vec<&FilesystemEntry> = fstab.filesystems().collect();
            if json {
                let out = serde_json::to_string_pretty(&entries)
                    .with_whatever_context(|e| format!("Failed to encode entries: {}", e))?;
                println!("{}", out);
            } else {
                for entry in entries {
                    print!("{}", entry_line(entry));
                }
            }
            Ok(true)
        }
        FstabCommand::Get { mount_point } => {
            match fstab.get_entry(&fstab_field(&mount_point)) {
                Some(entry) => {
                    print!("{}", entry_line(entry));
                    Ok(true)
                }
                None => {
                    info!("No fstab entry for {}", mount_point);
                    Ok(false)
                }
            }
        }
        FstabCommand::Add {
            device,
            mount_point,
            fs_type,
            options,
            dump,
            fsck,
        } => {
            fstab.add_entry(
                fstab_field(&device),
                fstab_field(&mount_point),
                fs_type,
                options,
                dump,
                fsck,
            );
            fstab.write()?;
            Ok(true)
        }
        FstabCommand::Remove { mount_point } => {
            if fstab
                .delete_entry(&fstab_field(&mount_point))
                .is_some()
            {
                fstab.write()?;
            } else {
                info!("No fstab entry for {}", mount_point);
            }
            Ok(true)
        }
    }
}

/// Field text as stored in fstab, whether `arg` was given plain or already
/// escaped.
fn fstab_field(arg: &str) -> String {
    escape_fstab_field(&unescape_fstab_field(arg))
}

/// Entry text with the line terminator guaranteed.
fn entry_line(entry: &FilesystemEntry) -> String {
    let mut line = entry.to_string();
    if !line.ends_with('\n') {
        line.push('\n');
    }
    line
}

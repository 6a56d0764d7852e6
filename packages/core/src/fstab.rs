//! Fstab table reading, editing and atomic writing.
//!
//! A [`Fstab`] holds every line of the file in order. Edits only touch the
//! lines they target; every other line is written back exactly as it was read.
//! Writing goes through a temporary file in the same directory that is renamed
//! over the original, so concurrent readers see either the old or the new
//! table and never a partial one.

use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::entry::{Entry, FilesystemEntry, IntoMountOptions};
use crate::error::{IoResultExt, Result};

/// Default fstab path.
pub const FSTAB_PATH: &str = "/etc/fstab";

/// Suffix of the hard-link backup refreshed on every write.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Mode given to a table written to a path that did not exist before.
pub const DEFAULT_MODE: u32 = 0o644;

/// An fstab file loaded into memory.
#[derive(Debug, Clone)]
pub struct Fstab {
    path: PathBuf,
    lines: Vec<Entry>,
}

impl Default for Fstab {
    fn default() -> Self {
        Self::new(FSTAB_PATH)
    }
}

impl Fstab {
    /// Creates an empty table bound to `path`. Nothing is read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lines: Vec::new(),
        }
    }

    /// Creates a table bound to `path` and loads it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut fstab = Self::new(path);
        fstab.read()?;
        Ok(fstab)
    }

    /// Creates a table bound to `path` from already loaded content.
    pub fn from_content(path: impl Into<PathBuf>, content: &str) -> Self {
        Self {
            path: path.into(),
            lines: parse_lines(content),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reloads the table from its own path.
    pub fn read(&mut self) -> Result<()> {
        self.lines = read_lines(&self.path)?;
        Ok(())
    }

    /// Replaces the in-memory lines with the content of `path`.
    ///
    /// Malformed lines are not an error; they are kept as opaque lines.
    pub fn read_from(&mut self, path: &Path) -> Result<()> {
        self.lines = read_lines(path)?;
        Ok(())
    }

    /// Atomically writes the table to its own path.
    pub fn write(&self) -> Result<()> {
        self.write_to(&self.path)
    }

    /// Atomically writes the table to `path`, keeping the previous content
    /// at `<path>.bak`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let backup = backup_path(path);
        replace_file(path, &self.render(), Some(&backup))
    }

    /// The file content this table would write.
    pub fn render(&self) -> String {
        self.lines.iter().map(Entry::render).collect()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.lines
    }

    /// Lines that carry a filesystem specification, in file order.
    pub fn filesystems(&self) -> impl Iterator<Item = &FilesystemEntry> {
        self.lines.iter().filter_map(Entry::as_filesystem)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn position(&self, mount_point: &str) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.mount_point() == Some(mount_point))
    }

    /// Returns the first entry mounted at `mount_point`.
    pub fn get_entry(&self, mount_point: &str) -> Option<&FilesystemEntry> {
        self.position(mount_point)
            .and_then(|i| self.lines[i].as_filesystem())
    }

    pub fn get_entry_mut(&mut self, mount_point: &str) -> Option<&mut FilesystemEntry> {
        let i = self.position(mount_point)?;
        self.lines[i].as_filesystem_mut()
    }

    /// Removes the first entry mounted at `mount_point`.
    ///
    /// Later entries for the same mount point are left alone.
    pub fn delete_entry(&mut self, mount_point: &str) -> Option<FilesystemEntry> {
        let i = self.position(mount_point)?;
        info!("Removing fstab entry for {}", mount_point);
        match self.lines.remove(i) {
            Entry::Filesystem(fs) => Some(fs),
            Entry::Opaque { .. } => None,
        }
    }

    /// Appends a canonical entry, dropping any existing entry for the same
    /// mount point first.
    pub fn add_entry(
        &mut self,
        device: impl Into<String>,
        mount_point: impl Into<String>,
        fs_type: impl Into<String>,
        options: impl IntoMountOptions,
        dump_frequency: u32,
        fsck_order: u32,
    ) {
        self.insert(FilesystemEntry::new(
            device,
            mount_point,
            fs_type,
            options,
            dump_frequency,
            fsck_order,
        ))
    }

    /// Appends `entry` with the same replace rule as [`Fstab::add_entry`].
    pub fn insert(&mut self, entry: FilesystemEntry) {
        if self.delete_entry(entry.mount_point()).is_some() {
            info!("Replacing fstab entry for {}", entry.mount_point());
        } else {
            info!("Adding fstab entry for {}", entry.mount_point());
        }

        self.lines.push(Entry::Filesystem(entry));
    }
}

/// Splits file content into lines, keeping each terminator with its line.
pub fn parse_lines(content: &str) -> Vec<Entry> {
    content.split_inclusive('\n').map(Entry::parse).collect()
}

fn read_lines(path: &Path) -> Result<Vec<Entry>> {
    let content = fs::read_to_string(path).fstab_read_context(path)?;
    Ok(parse_lines(&content))
}

/// Returns `<path>.bak`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Escapes characters that would break an fstab field, using the octal
/// sequences understood by mount(8).
///
/// Handles space (\040), tab (\011), newline (\012), and backslash (\134).
pub fn escape_fstab_field(field: &str) -> String {
    let mut encoded = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            ' ' => encoded.push_str(r"\040"),
            '\t' => encoded.push_str(r"\011"),
            '\n' => encoded.push_str(r"\012"),
            '\\' => encoded.push_str(r"\134"),
            _ => encoded.push(c),
        }
    }
    encoded
}

/// Reverses [`escape_fstab_field`]. Backslashes not followed by three octal
/// digits are kept as they are.
pub fn unescape_fstab_field(field: &str) -> String {
    let mut decoded = String::with_capacity(field.len());
    let mut rest = field;

    while let Some(pos) = rest.find('\\') {
        decoded.push_str(&rest[..pos]);
        let digits = rest.get(pos + 1..pos + 4);
        match digits
            .filter(|d| d.bytes().all(|b| (b'0'..=b'7').contains(&b)))
            .and_then(|d| u8::from_str_radix(d, 8).ok())
        {
            Some(byte) => {
                decoded.push(char::from(byte));
                rest = &rest[pos + 4..];
            }
            None => {
                decoded.push('\\');
                rest = &rest[pos + 1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

/// Replaces `path` with `contents` in a single rename.
///
/// The new file takes over the permission bits of the one it replaces. When
/// `backup` is set and `path` exists, the old file stays reachable there
/// through a hard link. On any error before the rename, `path` is untouched
/// and the temporary file is removed.
pub(crate) fn replace_file(path: &Path, contents: &str, backup: Option<&Path>) -> Result<()> {
    // Same directory, so the final rename never crosses filesystems.
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = format!(
        "{}.",
        path.file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default()
    );

    let mut temp = tempfile::Builder::new()
        .prefix(&prefix)
        .tempfile_in(dir)
        .write_context(dir)?;
    debug!("Writing {} through {}", path.display(), temp.path().display());

    temp.write_all(contents.as_bytes())
        .write_context(temp.path())?;
    temp.as_file()
        .sync_all()
        .write_context(temp.path())?;

    let permissions = match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e).permissions_context(path),
    };
    let exists = permissions.is_some();
    let permissions = permissions.unwrap_or_else(|| Permissions::from_mode(DEFAULT_MODE));
    debug!(
        "Applying mode {:o} to {}",
        permissions.mode() & 0o7777,
        temp.path().display()
    );
    fs::set_permissions(temp.path(), permissions).permissions_context(temp.path())?;

    if let Some(backup) = backup
        && exists
    {
        refresh_backup(path, backup)?;
    }

    temp.persist(path)
        .map_err(|e| e.error)
        .rename_context(path)?;
    debug!("Replaced {}", path.display());

    Ok(())
}

fn refresh_backup(path: &Path, backup: &Path) -> Result<()> {
    match fs::remove_file(backup) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).backup_context(backup),
    }
    fs::hard_link(path, backup).backup_context(backup)?;
    debug!("Linked backup {}", backup.display());
    Ok(())
}

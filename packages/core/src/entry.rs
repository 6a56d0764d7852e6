//! Fstab line model.
//!
//! Every physical line of a mount table becomes an [`Entry`]. Lines holding a
//! well-formed six-field filesystem specification are split into their fields
//! together with the exact whitespace around them, so that rendering an
//! untouched entry gives back the original bytes. Everything else (blank
//! lines, comments, malformed text) is kept verbatim as an opaque line.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::error::{Error, Result};

/// Six whitespace-separated fields, anchored to the whole line.
///
/// The trailing group also swallows the line terminator.
static FILESYSTEM_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\A(?P<ws1>\s*)",
        r"(?P<device>\S*)",
        r"(?P<ws2>\s+)",
        r"(?P<mount_point>\S+)",
        r"(?P<ws3>\s+)",
        r"(?P<fs_type>\S+)",
        r"(?P<ws4>\s+)",
        r"(?P<options>\S+)",
        r"(?P<ws5>\s+)",
        r"(?P<dump>[0-9]+)",
        r"(?P<ws6>\s+)",
        r"(?P<fsck>[0-9]+)",
        r"(?P<ws7>\s*)\z",
    ))
    .expect("fstab line pattern must compile")
});

pub trait IntoMountOptions {
    fn into_options(self) -> Vec<String>;
}

impl IntoMountOptions for &str {
    fn into_options(self) -> Vec<String> {
        self.split(',').map(|s| s.to_string()).collect()
    }
}

impl IntoMountOptions for &String {
    fn into_options(self) -> Vec<String> {
        self.as_str().into_options()
    }
}

impl IntoMountOptions for String {
    fn into_options(self) -> Vec<String> {
        self.as_str().into_options()
    }
}

impl IntoMountOptions for Vec<String> {
    fn into_options(self) -> Vec<String> {
        self
    }
}

impl IntoMountOptions for Vec<&str> {
    fn into_options(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoMountOptions for &[&str] {
    fn into_options(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

/// Whitespace surrounding the six fields of a filesystem line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spacing {
    pub leading: String,
    pub after_device: String,
    pub after_mount_point: String,
    pub after_fs_type: String,
    pub after_options: String,
    pub after_dump: String,
    /// Includes the line terminator, if any.
    pub trailing: String,
}

impl Spacing {
    /// Single spaces between fields and a newline at the end.
    pub fn canonical() -> Self {
        Self {
            leading: String::new(),
            after_device: " ".to_string(),
            after_mount_point: " ".to_string(),
            after_fs_type: " ".to_string(),
            after_options: " ".to_string(),
            after_dump: " ".to_string(),
            trailing: "\n".to_string(),
        }
    }
}

/// A line carrying a filesystem specification.
///
/// The dump and fsck columns keep the digits exactly as read, so `007`
/// still renders as `007`; the accessors convert to and from integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemEntry {
    device: String,
    mount_point: String,
    fs_type: String,
    options: Vec<String>,
    dump: String,
    fsck: String,
    spacing: Spacing,
}

impl FilesystemEntry {
    /// Creates an entry laid out in canonical form.
    pub fn new(
        device: impl Into<String>,
        mount_point: impl Into<String>,
        fs_type: impl Into<String>,
        options: impl IntoMountOptions,
        dump_frequency: u32,
        fsck_order: u32,
    ) -> Self {
        Self {
            device: device.into(),
            mount_point: mount_point.into(),
            fs_type: fs_type.into(),
            options: options.into_options(),
            dump: dump_frequency.to_string(),
            fsck: fsck_order.to_string(),
            spacing: Spacing::canonical(),
        }
    }

    /// Splits a line into its fields, or returns `None` if it does not
    /// match the six-field layout.
    pub fn from_line(line: &str) -> Option<Self> {
        let caps = FILESYSTEM_LINE.captures(line)?;
        let group = |name: &str| caps.name(name).map_or("", |m| m.as_str()).to_string();

        Some(Self {
            device: group("device"),
            mount_point: group("mount_point"),
            fs_type: group("fs_type"),
            options: group("options").as_str().into_options(),
            dump: group("dump"),
            fsck: group("fsck"),
            spacing: Spacing {
                leading: group("ws1"),
                after_device: group("ws2"),
                after_mount_point: group("ws3"),
                after_fs_type: group("ws4"),
                after_options: group("ws5"),
                after_dump: group("ws6"),
                trailing: group("ws7"),
            },
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn set_device(&mut self, device: impl Into<String>) {
        self.device = device.into();
    }

    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    pub fn set_mount_point(&mut self, mount_point: impl Into<String>) {
        self.mount_point = mount_point.into();
    }

    pub fn fs_type(&self) -> &str {
        &self.fs_type
    }

    pub fn set_fs_type(&mut self, fs_type: impl Into<String>) {
        self.fs_type = fs_type.into();
    }

    /// Mount options in file order.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn set_options(&mut self, options: impl IntoMountOptions) {
        self.options = options.into_options();
    }

    /// Used by dump(8) to decide which filesystems need to be dumped.
    pub fn dump_frequency(&self) -> Result<u32> {
        parse_column("dump_frequency", &self.dump)
    }

    pub fn set_dump_frequency(&mut self, value: u32) {
        self.dump = value.to_string();
    }

    /// Used by fsck(8) to order filesystem checks at boot.
    pub fn fsck_order(&self) -> Result<u32> {
        parse_column("fsck_order", &self.fsck)
    }

    pub fn set_fsck_order(&mut self, value: u32) {
        self.fsck = value.to_string();
    }

    pub fn spacing(&self) -> &Spacing {
        &self.spacing
    }

}

fn parse_column(field: &'static str, digits: &str) -> Result<u32> {
    digits.parse().map_err(|_| Error::NumericField {
        field,
        value: digits.to_string(),
    })
}

/// Serializes a numeric column as an integer, or as its digits when they
/// overflow `u32`.
fn serialize_column<S: SerializeStruct>(
    state: &mut S,
    key: &'static str,
    digits: &str,
) -> std::result::Result<(), S::Error> {
    match digits.parse::<u32>() {
        Ok(value) => state.serialize_field(key, &value),
        Err(_) => state.serialize_field(key, digits),
    }
}

impl Serialize for FilesystemEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FilesystemEntry", 6)?;
        state.serialize_field("device", &self.device)?;
        state.serialize_field("mount_point", &self.mount_point)?;
        state.serialize_field("fs_type", &self.fs_type)?;
        state.serialize_field("options", &self.options)?;
        serialize_column(&mut state, "dump_frequency", &self.dump)?;
        serialize_column(&mut state, "fsck_order", &self.fsck)?;
        state.end()
    }
}

impl fmt::Display for FilesystemEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ws = &self.spacing;
        write!(
            f,
            "{}{}{}{}{}{}{}{}{}{}{}{}{}",
            ws.leading,
            self.device,
            ws.after_device,
            self.mount_point,
            ws.after_mount_point,
            self.fs_type,
            ws.after_fs_type,
            self.options.join(","),
            ws.after_options,
            self.dump,
            ws.after_dump,
            self.fsck,
            ws.trailing,
        )
    }
}

/// One line of a mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Filesystem(FilesystemEntry),
    /// Blank, comment or malformed line, kept byte for byte.
    Opaque { raw: String },
}

impl Entry {
    /// Classifies a raw line. Never fails: anything that is not a valid
    /// filesystem specification becomes [`Entry::Opaque`].
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Self::opaque(raw);
        }

        match FilesystemEntry::from_line(raw) {
            Some(fs) => Self::Filesystem(fs),
            None => Self::opaque(raw),
        }
    }

    fn opaque(raw: &str) -> Self {
        Self::Opaque {
            raw: raw.to_string(),
        }
    }

    /// Text written back to the file for this line.
    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn has_filesystem(&self) -> bool {
        matches!(self, Self::Filesystem(_))
    }

    pub fn as_filesystem(&self) -> Option<&FilesystemEntry> {
        match self {
            Self::Filesystem(fs) => Some(fs),
            Self::Opaque { .. } => None,
        }
    }

    pub fn as_filesystem_mut(&mut self) -> Option<&mut FilesystemEntry> {
        match self {
            Self::Filesystem(fs) => Some(fs),
            Self::Opaque { .. } => None,
        }
    }

    fn filesystem(&self, field: &'static str) -> Result<&FilesystemEntry> {
        self.as_filesystem().ok_or(Error::NoFilesystem { field })
    }

    fn filesystem_mut(&mut self, field: &'static str) -> Result<&mut FilesystemEntry> {
        self.as_filesystem_mut().ok_or(Error::NoFilesystem { field })
    }

    pub fn device(&self) -> Option<&str> {
        self.as_filesystem().map(FilesystemEntry::device)
    }

    pub fn mount_point(&self) -> Option<&str> {
        self.as_filesystem().map(FilesystemEntry::mount_point)
    }

    pub fn fs_type(&self) -> Option<&str> {
        self.as_filesystem().map(FilesystemEntry::fs_type)
    }

    pub fn options(&self) -> Option<&[String]> {
        self.as_filesystem().map(FilesystemEntry::options)
    }

    pub fn dump_frequency(&self) -> Result<u32> {
        self.filesystem("dump_frequency")?.dump_frequency()
    }

    pub fn fsck_order(&self) -> Result<u32> {
        self.filesystem("fsck_order")?.fsck_order()
    }

    pub fn set_device(&mut self, device: impl Into<String>) -> Result<()> {
        self.filesystem_mut("device")?.set_device(device);
        Ok(())
    }

    pub fn set_mount_point(&mut self, mount_point: impl Into<String>) -> Result<()> {
        self.filesystem_mut("mount_point")?
            .set_mount_point(mount_point);
        Ok(())
    }

    pub fn set_fs_type(&mut self, fs_type: impl Into<String>) -> Result<()> {
        self.filesystem_mut("fs_type")?.set_fs_type(fs_type);
        Ok(())
    }

    pub fn set_options(&mut self, options: impl IntoMountOptions) -> Result<()> {
        self.filesystem_mut("options")?.set_options(options);
        Ok(())
    }

    pub fn set_dump_frequency(&mut self, value: u32) -> Result<()> {
        self.filesystem_mut("dump_frequency")?
            .set_dump_frequency(value);
        Ok(())
    }

    pub fn set_fsck_order(&mut self, value: u32) -> Result<()> {
        self.filesystem_mut("fsck_order")?.set_fsck_order(value);
        Ok(())
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filesystem(fs) => fmt::Display::fmt(fs, f),
            Self::Opaque { raw } => f.write_str(raw),
        }
    }
}

impl From<&str> for Entry {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<FilesystemEntry> for Entry {
    fn from(fs: FilesystemEntry) -> Self {
        Self::Filesystem(fs)
    }
}

impl FromStr for Entry {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

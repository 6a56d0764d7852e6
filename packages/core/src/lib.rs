//! cloudstor-mount-core: Core library for provisioning WebDAV mounts.
//!
//! The heart of the library is a lossless model of `/etc/fstab`: every line
//! is parsed into an [`Entry`] that renders back to the exact same bytes, and
//! a [`Fstab`] table that can be edited by mount point and written back
//! atomically.
//!
//! # Modules
//!
//! - [`entry`]: Line parsing and rendering
//! - [`fstab`]: Table lookup, editing and atomic write-back
//! - [`secrets`]: davfs2 credentials file
//! - [`mount`]: Mount point helpers
//! - [`user`]: Primary user lookup
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use cloudstor_mount_core::Fstab;
//!
//! let mut fstab = Fstab::open("/etc/fstab").unwrap();
//! if fstab.get_entry("/cloudstor").is_none() {
//!     fstab.add_entry(
//!         "https://example.org/remote.php/webdav/",
//!         "/cloudstor",
//!         "davfs",
//!         "_netdev",
//!         0,
//!         0,
//!     );
//!     // Requires write access to /etc:
//!     fstab.write().unwrap();
//! }
//! ```

pub mod entry;
pub mod error;
pub mod fstab;
pub mod mount;
pub mod secrets;
pub mod user;

// Re-export commonly used types
pub use entry::{Entry, FilesystemEntry, IntoMountOptions, Spacing};
pub use error::{Error, Result};
pub use fstab::Fstab;

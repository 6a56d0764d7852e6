//! Agent configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes. Command line flags are applied on top by the caller.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cloudstor_mount_core::Result;
use cloudstor_mount_core::fstab::FSTAB_PATH;
use cloudstor_mount_core::secrets::DAVFS2_SECRETS_PATH;
use serde::Deserialize;
use snafu::ResultExt;

/// Dynamic vendor data endpoint of the OpenStack metadata service.
pub const VENDOR_DATA_URL: &str = "http://169.254.169.254/openstack/latest/vendor_data2.json";

/// CloudStor WebDAV endpoint.
pub const CLOUDSTOR_URL: &str = "https://cloudstor.aarnet.edu.au/plus/remote.php/webdav/";

/// Where CloudStor gets mounted.
pub const CLOUDSTOR_MOUNT: &str = "/cloudstor";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub vendor_data_url: String,
    pub webdav_url: String,
    pub mount_point: PathBuf,
    pub fstab_path: PathBuf,
    pub secrets_path: PathBuf,
    pub fs_type: String,
    pub http_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            vendor_data_url: VENDOR_DATA_URL.to_string(),
            webdav_url: CLOUDSTOR_URL.to_string(),
            mount_point: PathBuf::from(CLOUDSTOR_MOUNT),
            fstab_path: PathBuf::from(FSTAB_PATH),
            secrets_path: PathBuf::from(DAVFS2_SECRETS_PATH),
            fs_type: "davfs".to_string(),
            http_timeout_secs: 10,
        }
    }
}

impl AgentConfig {
    /// Loads the config file at `path`, or the defaults when there is none.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path)
            .with_whatever_context(|e| format!("Failed to read config {}: {}", path.display(), e))?;
        Self::from_toml(&content)
            .with_whatever_context(|e| format!("Invalid config {}: {}", path.display(), e))
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::load(None).unwrap();
        assert_eq!(config.mount_point, PathBuf::from("/cloudstor"));
        assert_eq!(config.fstab_path, PathBuf::from("/etc/fstab"));
        assert_eq!(config.fs_type, "davfs");
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "mount_point = \"/mnt/cloud\"").unwrap();
        writeln!(file, "http_timeout_secs = 30").unwrap();

        let config = AgentConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.mount_point, PathBuf::from("/mnt/cloud"));
        assert_eq!(config.http_timeout_secs, 30);
        assert_eq!(config.webdav_url, CLOUDSTOR_URL);
    }

    #[test]
    fn test_invalid_file() {
        assert!(AgentConfig::from_toml("mount_point = 3").is_err());
        assert!(AgentConfig::load(Some(Path::new("/nonexistent/agent.toml"))).is_err());
    }
}

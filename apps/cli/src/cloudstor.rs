//! CloudStor provisioning flow.
//!
//! Reads credentials from the instance vendor data, checks them against the
//! WebDAV endpoint, then wires up fstab, the davfs2 secrets file and the
//! mount itself.

use cloudstor_mount_core::fstab::escape_fstab_field;
use cloudstor_mount_core::{Fstab, Result, mount, secrets, user};
use log::{error, info};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use snafu::ResultExt;

use crate::config::AgentConfig;

/// CloudStor account from vendor data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Extracts `nectar.cloudstor` credentials from a vendor data document.
pub fn credentials_from_vendor_data(vendor_data: &serde_json::Value) -> Option<Credentials> {
    let cloudstor = vendor_data.get("nectar")?.get("cloudstor")?;
    serde_json::from_value(cloudstor.clone()).ok()
}

fn http_client(config: &AgentConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.http_timeout())
        .build()
        .with_whatever_context(|e| format!("Failed to build HTTP client: {}", e))
}

/// Downloads the vendor data document.
pub fn fetch_vendor_data(config: &AgentConfig) -> Result<serde_json::Value> {
    info!("Fetching data from: {}", config.vendor_data_url);
    http_client(config)?
        .get(&config.vendor_data_url)
        .send()
        .and_then(|resp| resp.error_for_status())
        .and_then(|resp| resp.json::<serde_json::Value>())
        .with_whatever_context(|e| {
            format!(
                "Failed to fetch vendor data from {}: {}",
                config.vendor_data_url, e
            )
        })
}

/// Checks the credentials against the WebDAV endpoint.
///
/// Rejected credentials are reported and yield `Ok(false)`; only transport
/// failures are errors.
pub fn test_credentials(config: &AgentConfig, credentials: &Credentials) -> Result<bool> {
    info!("Testing CloudStor credentials");
    let response = http_client(config)?
        .get(&config.webdav_url)
        .basic_auth(&credentials.username, Some(&credentials.password))
        .send()
        .with_whatever_context(|e| format!("Failed to reach {}: {}", config.webdav_url, e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(true);
    }

    if is_auth_failure(status) {
        error!(
            "There is an authentication issue with your CloudStor credentials. \
             Please contact support."
        );
    } else {
        let body = response.text().unwrap_or_default();
        error!(
            "There was an unknown error when testing your CloudStor credentials. \
             The error was: {}",
            body
        );
    }
    Ok(false)
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::SERVICE_UNAVAILABLE
}

/// Mount options for the CloudStor entry.
pub fn mount_options(default_user: Option<&str>) -> String {
    match default_user {
        Some(user) => format!("uid={},_netdev", user),
        None => "_netdev".to_string(),
    }
}

/// Adds the CloudStor line to fstab unless the mount point already has one.
///
/// Returns whether the table was written.
pub fn ensure_fstab_entry(config: &AgentConfig, default_user: Option<&str>) -> Result<bool> {
    let mut fstab = Fstab::open(&config.fstab_path)?;
    let mount_point = escape_fstab_field(&config.mount_point.to_string_lossy());

    if fstab.get_entry(&mount_point).is_some() {
        info!("Fstab entry for {} already present", mount_point);
        return Ok(false);
    }

    info!("Adding fstab entry");
    fstab.add_entry(
        escape_fstab_field(&config.webdav_url),
        mount_point,
        config.fs_type.as_str(),
        mount_options(default_user),
        0,
        0,
    );
    fstab.write()?;
    Ok(true)
}

/// Sets up fstab, secrets and the mount for an account.
///
/// Returns `Ok(false)` when the credentials were rejected.
pub fn configure(config: &AgentConfig, credentials: &Credentials) -> Result<bool> {
    info!("Setting up CloudStor for account: {}", credentials.username);

    if mount::is_mounted(&config.mount_point) {
        info!("CloudStor already mounted.");
        return Ok(true);
    }

    if !test_credentials(config, credentials)? {
        info!("CloudStor login failure.");
        return Ok(false);
    }

    provision(config, credentials, user::default_user().as_deref())?;

    if let Err(e) = mount::mount_fstab_entry(&config.mount_point) {
        error!("{}", e);
    }
    Ok(true)
}

/// Local part of [`configure`]: fstab entry, mount point and secrets.
pub fn provision(
    config: &AgentConfig,
    credentials: &Credentials,
    default_user: Option<&str>,
) -> Result<()> {
    ensure_fstab_entry(config, default_user)?;
    mount::create_mount_point(&config.mount_point)?;
    secrets::add_secret(
        &config.secrets_path,
        &config.webdav_url,
        &credentials.username,
        &credentials.password,
    )
}

/// Full agent run: vendor data lookup followed by [`configure`].
pub fn setup(config: &AgentConfig) -> Result<bool> {
    let vendor_data = fetch_vendor_data(config)?;

    match credentials_from_vendor_data(&vendor_data) {
        Some(credentials) => configure(config, &credentials),
        None => {
            info!("No CloudStor credentials in vendor data");
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::path::Path;
    use std::sync::mpsc;
    use std::thread;
    use tempfile::tempdir;

    /// Answers a single HTTP request with `status` and `body`. Returns the URL
    /// to hit and a receiver for the raw request text.
    fn serve_once(status: &'static str, body: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            tx.send(String::from_utf8_lossy(&request).to_string()).unwrap();
        });

        (format!("http://{addr}/remote.php/webdav/"), rx)
    }

    fn credentials_check(status: &'static str, body: &'static str) -> (bool, String) {
        let (url, request) = serve_once(status, body);
        let config = AgentConfig {
            webdav_url: url,
            ..AgentConfig::default()
        };
        let credentials = Credentials {
            username: "alice".to_string(),
            password: "pw".to_string(),
        };

        let accepted = test_credentials(&config, &credentials).unwrap();
        (accepted, request.recv().unwrap())
    }

    fn test_config(root: &Path) -> AgentConfig {
        AgentConfig {
            mount_point: root.join("cloudstor"),
            fstab_path: root.join("fstab"),
            secrets_path: root.join("secrets"),
            ..AgentConfig::default()
        }
    }

    #[test]
    fn test_credentials_from_vendor_data() {
        let data = json!({
            "nectar": {"cloudstor": {"username": "alice@uni.edu.au", "password": "pw"}}
        });
        assert_eq!(
            credentials_from_vendor_data(&data),
            Some(Credentials {
                username: "alice@uni.edu.au".to_string(),
                password: "pw".to_string(),
            })
        );
    }

    #[test]
    fn test_incomplete_vendor_data() {
        assert_eq!(credentials_from_vendor_data(&json!({})), None);
        assert_eq!(credentials_from_vendor_data(&json!({"nectar": {}})), None);
        let no_password = json!({"nectar": {"cloudstor": {"username": "alice"}}});
        assert_eq!(credentials_from_vendor_data(&no_password), None);
    }

    #[test]
    fn test_mount_options() {
        assert_eq!(mount_options(Some("ubuntu")), "uid=ubuntu,_netdev");
        assert_eq!(mount_options(None), "_netdev");
    }

    #[test]
    fn test_auth_failure_statuses() {
        assert!(is_auth_failure(StatusCode::UNAUTHORIZED));
        assert!(is_auth_failure(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_auth_failure(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_credentials_accepted() {
        let (accepted, request) = credentials_check("200 OK", "");

        assert!(accepted);
        assert!(request.starts_with("GET /remote.php/webdav/ "));
        // base64("alice:pw")
        assert!(
            request
                .to_lowercase()
                .contains("authorization: basic ywxpy2u6chc=")
        );
    }

    #[test]
    fn test_credentials_rejected() {
        assert!(!credentials_check("401 Unauthorized", "").0);
        assert!(!credentials_check("503 Service Unavailable", "").0);
    }

    #[test]
    fn test_credentials_unknown_error() {
        let (accepted, _) = credentials_check("500 Internal Server Error", "boom");
        assert!(!accepted);
    }

    #[test]
    fn test_credentials_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = AgentConfig {
            webdav_url: format!("http://{addr}/"),
            ..AgentConfig::default()
        };
        let credentials = Credentials {
            username: "alice".to_string(),
            password: "pw".to_string(),
        };
        assert!(test_credentials(&config, &credentials).is_err());
    }

    #[test]
    fn test_ensure_fstab_entry_only_once() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        fs::write(&config.fstab_path, "/dev/sda1 / ext4 defaults 0 1\n").unwrap();

        assert!(ensure_fstab_entry(&config, Some("ubuntu")).unwrap());
        assert!(!ensure_fstab_entry(&config, None).unwrap());

        let expected = format!(
            "/dev/sda1 / ext4 defaults 0 1\n{} {} davfs uid=ubuntu,_netdev 0 0\n",
            crate::config::CLOUDSTOR_URL,
            config.mount_point.display()
        );
        assert_eq!(fs::read_to_string(&config.fstab_path).unwrap(), expected);
    }

    #[test]
    fn test_provision() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        fs::write(&config.fstab_path, "# empty\n").unwrap();
        fs::write(&config.secrets_path, "").unwrap();
        let credentials = Credentials {
            username: "alice".to_string(),
            password: "p\"w".to_string(),
        };

        provision(&config, &credentials, None).unwrap();

        assert!(config.mount_point.is_dir());
        let fstab = Fstab::open(&config.fstab_path).unwrap();
        let entry = fstab
            .get_entry(&config.mount_point.to_string_lossy())
            .unwrap();
        assert_eq!(entry.options(), ["_netdev"]);
        assert_eq!(
            fs::read_to_string(&config.secrets_path).unwrap(),
            format!("{} alice \"p\\\"w\"\n", config.webdav_url)
        );
    }
}

//! davfs2 credentials file handling.
//!
//! Each line of `/etc/davfs2/secrets` maps a WebDAV URL (or mount point) to a
//! username and password. Updating a URL drops its old lines and appends a
//! fresh one; the file is replaced atomically and keeps its permission bits.

use std::fs;
use std::path::Path;

use log::info;

use crate::error::{IoResultExt, Result};
use crate::fstab::replace_file;

/// Default davfs2 secrets path.
pub const DAVFS2_SECRETS_PATH: &str = "/etc/davfs2/secrets";

/// Formats one secrets line.
///
/// The password is always double-quoted since davfs2 chokes on some special
/// characters otherwise; embedded quotes are escaped.
pub fn secret_line(url: &str, username: &str, password: &str) -> String {
    format!("{} {} \"{}\"\n", url, username, password.replace('"', "\\\""))
}

/// Returns `content` with every line starting with `url` replaced by a single
/// new line at the end.
pub fn update_secrets_content(content: &str, url: &str, username: &str, password: &str) -> String {
    let mut output: String = content
        .split_inclusive('\n')
        .filter(|line| !line.starts_with(url))
        .collect();

    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    output.push_str(&secret_line(url, username, password));
    output
}

/// Stores credentials for `url` in the secrets file at `path`.
pub fn add_secret(path: &Path, url: &str, username: &str, password: &str) -> Result<()> {
    info!("Adding credentials for {} to {}", url, path.display());

    let content = fs::read_to_string(path).secrets_read_context(path)?;
    let updated = update_secrets_content(&content, url, username, password);
    replace_file(path, &updated, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    const URL: &str = "https://cloudstor.aarnet.edu.au/plus/remote.php/webdav/";

    #[test]
    fn test_secret_line_escapes_quotes() {
        assert_eq!(
            secret_line(URL, "alice", r#"pa"ss"#),
            format!("{URL} alice \"pa\\\"ss\"\n")
        );
    }

    #[test]
    fn test_update_replaces_existing_url() {
        let content = format!(
            "# davfs2 secrets\n{URL} old \"old\"\n/media/other bob \"x\"\n{URL} older \"y\"\n"
        );
        let updated = update_secrets_content(&content, URL, "alice", "secret");

        assert_eq!(
            updated,
            format!("# davfs2 secrets\n/media/other bob \"x\"\n{URL} alice \"secret\"\n")
        );
    }

    #[test]
    fn test_update_terminates_last_line() {
        let updated = update_secrets_content("# no newline", URL, "alice", "pw");
        assert_eq!(updated, format!("# no newline\n{URL} alice \"pw\"\n"));
    }

    #[test]
    fn test_add_secret_keeps_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets");
        fs::write(&path, "# secrets\n").unwrap();
        fs::set_permissions(&path, Permissions::from_mode(0o600)).unwrap();

        add_secret(&path, URL, "alice", "pw").unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("# secrets\n{URL} alice \"pw\"\n")
        );
        assert_eq!(
            fs::metadata(&path).unwrap().permissions().mode() & 0o7777,
            0o600
        );
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_add_secret_missing_file() {
        let dir = tempdir().unwrap();
        let err = add_secret(&dir.path().join("secrets"), URL, "alice", "pw").unwrap_err();
        assert!(matches!(err, Error::SecretsRead { .. }));
    }
}

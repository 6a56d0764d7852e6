//! Lookup of the machine's primary login user.

use std::fs;
use std::path::Path;

use nix::unistd::{Uid, User};

/// Default user ID (first regular user on most Linux systems).
pub const DEFAULT_UID: u32 = 1000;

/// Home directory root scanned when no user owns [`DEFAULT_UID`].
pub const HOME_ROOT: &str = "/home";

/// Returns the name of the primary user, if one can be found.
pub fn default_user() -> Option<String> {
    match User::from_uid(Uid::from_raw(DEFAULT_UID)) {
        Ok(Some(user)) => Some(user.name),
        _ => first_home_dir(Path::new(HOME_ROOT)),
    }
}

/// Name of the alphabetically first directory under `home_root`.
pub fn first_home_dir(home_root: &Path) -> Option<String> {
    let mut names: Vec<String> = fs::read_dir(home_root)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    names.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_first_home_dir() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("zoe")).unwrap();
        fs::create_dir(dir.path().join("ubuntu")).unwrap();
        fs::write(dir.path().join("aaa-not-a-dir"), "").unwrap();

        assert_eq!(first_home_dir(dir.path()).as_deref(), Some("ubuntu"));
    }

    #[test]
    fn test_first_home_dir_missing_root() {
        let dir = tempdir().unwrap();
        assert_eq!(first_home_dir(&dir.path().join("home")), None);
        assert_eq!(first_home_dir(dir.path()), None);
    }
}

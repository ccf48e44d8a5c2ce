//! Clip file resolution.
//!
//! The two clip files live under a single resource root: either next to the
//! installed binary (packaged layout) or in the working directory (dev run).
//! `--assets` overrides both.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

pub const BA_FILE: &str = "ba.wav";
pub const DA_FILE: &str = "da.wav";

/// Resolve the directory holding the clip files.
pub fn resource_root(override_dir: Option<&Path>) -> io::Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir.to_path_buf());
    }

    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            if clips_present(dir) {
                return Ok(dir.to_path_buf());
            }
        }
    }

    env::current_dir()
}

fn clips_present(dir: &Path) -> bool {
    dir.join(BA_FILE).is_file() && dir.join(DA_FILE).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn explicit_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let root = resource_root(Some(dir.path())).unwrap();
        assert_eq!(root, dir.path());
    }

    #[test]
    fn clips_present_requires_both_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!clips_present(dir.path()));

        fs::write(dir.path().join(BA_FILE), b"riff").unwrap();
        assert!(!clips_present(dir.path()));

        fs::write(dir.path().join(DA_FILE), b"riff").unwrap();
        assert!(clips_present(dir.path()));
    }

    #[test]
    fn falls_back_to_working_directory() {
        // Test binaries never ship clips next to the executable.
        let root = resource_root(None).unwrap();
        assert_eq!(root, env::current_dir().unwrap());
    }
}

//! Open-path registry
//!
//! Process-wide set of database files that currently have a live handle.
//! A second open of the same file in this process is rejected with
//! `AlreadyOpen`. Nothing here coordinates with other processes.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::error::{DexError, Result};

fn open_paths() -> &'static Mutex<HashSet<PathBuf>> {
    static OPEN_PATHS: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    OPEN_PATHS.get_or_init(Default::default)
}

/// Exclusive claim on a database path, released on drop
#[derive(Debug)]
pub struct PathClaim {
    path: PathBuf,
}

impl PathClaim {
    /// Claim `path`, failing if another live handle holds it
    pub fn acquire(path: &Path) -> Result<Self> {
        let key = canonical_path(path)?;

        let mut open = open_paths().lock();
        if !open.insert(key.clone()) {
            return Err(DexError::AlreadyOpen(key));
        }

        Ok(Self { path: key })
    }
}

impl Drop for PathClaim {
    fn drop(&mut self) {
        open_paths().lock().remove(&self.path);
    }
}

/// Whether some handle in this process currently holds `path`
pub fn is_claimed(path: &Path) -> bool {
    match canonical_path(path) {
        Ok(key) => open_paths().lock().contains(&key),
        Err(_) => false,
    }
}

/// Canonical form of a path whose final component may not exist yet
fn canonical_path(path: &Path) -> Result<PathBuf> {
    match fs::canonicalize(path) {
        Ok(p) => Ok(p),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let name = path.file_name().ok_or_else(|| {
                DexError::Config(format!("Not a file path: {}", path.display()))
            })?;
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            Ok(fs::canonicalize(parent)?.join(name))
        }
        Err(e) => Err(e.into()),
    }
}

//! Tool cache keyed by (tool, resolved version).
//!
//! Layout: `<root>/<tool>/<version>/<arch>/` holds the installed tree and
//! `<root>/<tool>/<version>/<arch>.complete` marks it as fully written.
//! Trees are copied into a hidden sibling of the entry and renamed into
//! place, so concurrent stores of one key never see each other's partial copy.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{InstallError, Result};
use crate::version::LATEST;

pub struct CacheStore {
    root: PathBuf,
    arch: String,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>, arch: impl ToString) -> Self {
        Self {
            root: root.into(),
            arch: arch.to_string(),
        }
    }

    fn entry_dir(&self, tool: &str, version: &str) -> PathBuf {
        self.root.join(tool).join(version).join(&self.arch)
    }

    fn marker_path(&self, tool: &str, version: &str) -> PathBuf {
        self.root
            .join(tool)
            .join(version)
            .join(format!("{}.complete", self.arch))
    }

    /// Directory of a previous install, if any. `latest` never hits.
    pub fn lookup(&self, tool: &str, version: &str) -> Option<PathBuf> {
        if version == LATEST || !is_key_component(tool) || !is_key_component(version) {
            return None;
        }

        let dir = self.entry_dir(tool, version);
        debug!(%tool, %version, dir = %dir.display(), "Checking tool cache");
        if dir.is_dir() && self.marker_path(tool, version).is_file() {
            Some(dir)
        } else {
            None
        }
    }

    /// Copy `working_dir` into the entry for `(tool, version)` and return it.
    /// Any previous content for the key is replaced; the last writer wins.
    pub fn store(&self, working_dir: &Path, tool: &str, version: &str) -> Result<PathBuf> {
        if !is_key_component(tool) || !is_key_component(version) {
            return Err(InstallError::InvalidVersion {
                version: format!("{tool}/{version}"),
            });
        }

        let dest = self.entry_dir(tool, version);
        let marker = self.marker_path(tool, version);
        let version_dir = self.root.join(tool).join(version);
        debug!(from = %working_dir.display(), to = %dest.display(), "Caching tool");

        fs::create_dir_all(&version_dir)
            .map_err(|e| InstallError::io("create", &version_dir, e))?;
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}-", self.arch))
            .tempdir_in(&version_dir)
            .map_err(|e| InstallError::io("create", &version_dir, e))?;
        copy_tree(working_dir, staging.path())?;

        remove_if_present(&marker, |p| fs::remove_file(p))?;
        let mut attempt = 0;
        loop {
            remove_if_present(&dest, |p| fs::remove_dir_all(p))?;
            match fs::rename(staging.path(), &dest) {
                Ok(()) => break,
                // Another store renamed its tree in after our removal.
                Err(e) if dest.exists() && attempt < MAX_RENAME_ATTEMPTS => {
                    debug!(attempt, error = %e, "Cache entry replaced concurrently, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(InstallError::io("rename", &dest, e)),
            }
        }

        fs::write(&marker, b"").map_err(|e| InstallError::io("write", &marker, e))?;
        Ok(dest)
    }
}

const MAX_RENAME_ATTEMPTS: u32 = 16;

/// A tool or version usable as a single path component of the cache.
fn is_key_component(key: &str) -> bool {
    !key.is_empty() && key != "." && key != ".." && !key.contains(['/', '\\'])
}

fn remove_if_present(path: &Path, remove: fn(&Path) -> io::Result<()>) -> Result<()> {
    match remove(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(InstallError::io("remove", path, e)),
    }
}

/// Recursively copy the contents of `src` into `dest`. `fs::copy` carries
/// permission bits along.
fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            InstallError::io("read", path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| InstallError::io("read", entry.path(), io::Error::other(e)))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| InstallError::io("create", &target, e))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| InstallError::io("create", parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| InstallError::io("copy", &target, e))?;
        }
    }
    Ok(())
}

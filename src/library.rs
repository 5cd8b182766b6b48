//! # Sound File Discovery
//!
//! Builds the name → path table the control surface serves. Configured
//! directories are scanned once at startup, non-recursively; the table is
//! immutable afterwards and shared with handlers without locking.
//!
//! Duplicate file names across directories resolve to the last-scanned
//! directory. Unreadable directories are skipped with a warning; discovery
//! is best-effort and never fails startup.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct SoundLibrary {
    files: BTreeMap<String, PathBuf>,
}

impl SoundLibrary {
    /// Scan the given directories in order and build the lookup table.
    pub fn scan(dirs: &[PathBuf]) -> Self {
        let mut files = BTreeMap::new();

        for dir in dirs {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping unreadable sound directory");
                    continue;
                }
            };

            for entry in entries.flatten() {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(true);
                if is_dir {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                let path = entry.path();
                debug!(file = %name, path = %path.display(), "discovered sound file");
                files.insert(name, path);
            }
        }

        Self { files }
    }

    /// All sound names in strict alphabetical order, without duplicates.
    pub fn names(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    /// Resolve a sound name to its full path.
    pub fn resolve(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
impl SoundLibrary {
    /// Build a library directly from entries, bypassing the filesystem.
    pub(crate) fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, PathBuf)>,
    {
        Self {
            files: entries.into_iter().collect(),
        }
    }
}

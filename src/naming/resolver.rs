//! Run-scoped collision resolution
//!
//! A candidate is free when it is neither on disk nor already handed out in
//! this run. Resolution and reservation happen under one lock and touch the
//! filesystem, so async callers run them on the blocking pool.
//!
//! Reservations are keyed case-insensitively: on the common case-insensitive
//! filesystems `Beach.jpg` and `beach.jpg` are the same file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Paths claimed by suggestions already resolved in this run
#[derive(Debug, Default)]
pub struct ReservationRegistry {
    reserved: Mutex<HashSet<String>>,
}

/// Case-folded reservation key
fn reservation_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

impl ReservationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a path that is neither on disk nor reserved, and reserve it.
    ///
    /// `current` is the file's own path: a candidate equal to it is the
    /// unchanged name, not a collision. Otherwise `_1`, `_2`, ... is inserted
    /// before the extension until a free path is found.
    pub fn resolve(&self, candidate: &Path, current: Option<&Path>) -> PathBuf {
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);

        let mut path = candidate.to_path_buf();
        let mut counter = 0u32;

        loop {
            let is_self = current == Some(path.as_path());
            let key = reservation_key(&path);
            if !reserved.contains(&key) && (is_self || !exists_on_disk(&path)) {
                reserved.insert(key);
                return path;
            }

            counter += 1;
            path = numbered_path(candidate, counter);
        }
    }

    pub fn is_reserved(&self, path: &Path) -> bool {
        self.reserved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&reservation_key(path))
    }

    pub fn len(&self) -> usize {
        self.reserved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Broken symlinks count as taken
fn exists_on_disk(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// `dir/stem.ext` -> `dir/stem_<n>.ext`
fn numbered_path(candidate: &Path, n: u32) -> PathBuf {
    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let file_name = match candidate.extension() {
        Some(ext) => format!("{}_{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}_{}", stem, n),
    };

    candidate.with_file_name(file_name)
}

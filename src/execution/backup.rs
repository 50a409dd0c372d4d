//! Backup copies taken before renaming
//!
//! Each apply run gets its own timestamp-named directory under the backup
//! root, created on first use. Copies keep the original modification time.

use chrono::Local;
use filetime::FileTime;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub struct BackupStore {
    root: PathBuf,
    run_dir: Option<PathBuf>,
}

impl BackupStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            run_dir: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The run directory, once something has been backed up
    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }

    async fn ensure_run_dir(&mut self) -> io::Result<PathBuf> {
        if let Some(dir) = &self.run_dir {
            return Ok(dir.clone());
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S_%3f").to_string();

        // Two runs in the same millisecond get a suffix
        let mut attempt = 0u32;
        let dir = loop {
            let candidate = if attempt == 0 {
                self.root.join(&timestamp)
            } else {
                self.root.join(format!("{}_{}", timestamp, attempt))
            };
            match tokio::fs::create_dir(&candidate).await {
                Ok(()) => break candidate,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e),
            }
        };

        debug!(dir = %dir.display(), "Created backup directory");
        self.run_dir = Some(dir.clone());
        Ok(dir)
    }

    /// Copy `source` into the run directory and return the copy's path
    pub async fn backup(&mut self, source: &Path) -> io::Result<PathBuf> {
        let dir = self.ensure_run_dir().await?;
        let file_name = source
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;

        let target = unique_path(&dir, Path::new(file_name));
        tokio::fs::copy(source, &target).await?;

        let meta = tokio::fs::metadata(source).await?;
        filetime::set_file_mtime(&target, FileTime::from_last_modification_time(&meta))?;

        Ok(target)
    }
}

/// `dir/name`, or `dir/stem_N.ext` when that is taken
fn unique_path(dir: &Path, name: &Path) -> PathBuf {
    let first = dir.join(name);
    if !first.exists() {
        return first;
    }

    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = name.extension().map(|e| e.to_string_lossy().to_string());

    (1u32..)
        .map(|n| match &ext {
            Some(ext) => dir.join(format!("{}_{}.{}", stem, n, ext)),
            None => dir.join(format!("{}_{}", stem, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(first)
}

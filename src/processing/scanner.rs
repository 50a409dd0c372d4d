//! Directory scanning
//!
//! Lists the immediate children of a directory that are regular files with a
//! supported extension and within the size limit. Results are sorted by path
//! so sequence numbers are stable between runs.

use crate::config::NamerConfig;
use crate::error::ScanError;
use crate::models::{MediaFile, MediaKind};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

pub struct MediaScanner {
    image_extensions: HashSet<String>,
    video_extensions: HashSet<String>,
    max_file_size: u64,
}

impl MediaScanner {
    /// Extensions are compared lowercase without the leading dot
    pub fn new(
        image_extensions: HashSet<String>,
        video_extensions: HashSet<String>,
        max_file_size: u64,
    ) -> Self {
        Self {
            image_extensions,
            video_extensions,
            max_file_size,
        }
    }

    pub fn from_config(config: &NamerConfig) -> Self {
        Self::new(
            config.supported_formats.image_set(),
            config.supported_formats.video_set(),
            config.processing.max_file_size_bytes(),
        )
    }

    fn kind_for(&self, extension: &str) -> Option<MediaKind> {
        if self.image_extensions.contains(extension) {
            Some(MediaKind::Image)
        } else if self.video_extensions.contains(extension) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub async fn scan(&self, dir: &Path) -> Result<Vec<MediaFile>, ScanError> {
        let io_err = |source| ScanError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let root = tokio::fs::canonicalize(dir).await.map_err(io_err)?;
        if !tokio::fs::metadata(&root).await.map_err(io_err)?.is_dir() {
            return Err(ScanError::NotADirectory(dir.to_path_buf()));
        }

        let mut entries = tokio::fs::read_dir(&root).await.map_err(io_err)?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();

            let extension = match path.extension() {
                Some(ext) => ext.to_string_lossy().to_lowercase(),
                None => continue,
            };
            let Some(kind) = self.kind_for(&extension) else {
                continue;
            };

            let metadata = match tokio::fs::metadata(&path).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            if metadata.len() > self.max_file_size {
                warn!(
                    path = %path.display(),
                    size = metadata.len(),
                    limit = self.max_file_size,
                    "Skipping file over size limit"
                );
                continue;
            }

            let modified = metadata
                .modified()
                .map(DateTime::<Local>::from)
                .unwrap_or_else(|_| Local::now());

            debug!(path = %path.display(), ?kind, "Found media file");
            files.push(MediaFile {
                path,
                extension,
                size: metadata.len(),
                modified,
                kind,
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        info!(dir = %root.display(), count = files.len(), "Scan complete");
        Ok(files)
    }
}

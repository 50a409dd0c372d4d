//! Rename applier
//!
//! Applies suggestions one at a time in input order. Each item is isolated:
//! a failed backup or rename is recorded and the run moves on.
//!
//! Must not run while a processing run is still working on the same
//! directory. The target check and the rename are separate steps, so a file
//! created in between can still be replaced on platforms where rename
//! overwrites.

use super::backup::BackupStore;
use crate::error::ApplyError;
use crate::models::{AppliedRename, ApplyFailure, ApplyResult, Suggestion, UndoResult};
use crate::processing::ProgressSink;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct RenameApplier {
    backup_root: PathBuf,
}

impl RenameApplier {
    pub fn new(backup_root: impl Into<PathBuf>) -> Self {
        Self {
            backup_root: backup_root.into(),
        }
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Rename every suggestion, optionally copying originals to a backup run directory first
    pub async fn apply(
        &self,
        suggestions: &[Suggestion],
        backup: bool,
        progress: &dyn ProgressSink,
    ) -> ApplyResult {
        let total = suggestions.len();
        let mut store = BackupStore::new(&self.backup_root);
        let mut result = ApplyResult {
            total,
            ..ApplyResult::default()
        };

        for (i, suggestion) in suggestions.iter().enumerate() {
            if suggestion.is_noop() {
                result.skipped_count += 1;
            } else {
                let backup_store = if backup { Some(&mut store) } else { None };
                match apply_one(suggestion, backup_store).await {
                    Ok((applied, backup_path)) => {
                        info!(
                            from = %applied.from.display(),
                            to = %applied.to.display(),
                            "Renamed"
                        );
                        result.backups.extend(backup_path);
                        result.renamed.push(applied);
                        result.renamed_count += 1;
                    }
                    Err((e, backup_path)) => {
                        warn!(
                            path = %suggestion.original_path.display(),
                            error = %e,
                            "Failed to apply rename"
                        );
                        result.backups.extend(backup_path);
                        result.failures.push(ApplyFailure {
                            path: suggestion.original_path.clone(),
                            error: e.to_string(),
                        });
                        result.failed_count += 1;
                    }
                }
            }
            progress.report(i + 1, total);
        }

        result.backup_dir = store.run_dir().map(Path::to_path_buf);

        info!(
            renamed = result.renamed_count,
            failed = result.failed_count,
            skipped = result.skipped_count,
            "Apply finished"
        );

        result
    }

    /// Move renamed files back, newest first
    ///
    /// A file is left where it is if something now occupies its original path.
    pub async fn undo(&self, renamed: &[AppliedRename]) -> UndoResult {
        let mut result = UndoResult::default();

        for applied in renamed.iter().rev() {
            match undo_one(applied).await {
                Ok(()) => {
                    info!(
                        from = %applied.to.display(),
                        to = %applied.from.display(),
                        "Restored"
                    );
                    result.restored_count += 1;
                }
                Err(e) => {
                    warn!(path = %applied.to.display(), error = %e, "Failed to undo rename");
                    result.failures.push(ApplyFailure {
                        path: applied.to.clone(),
                        error: e.to_string(),
                    });
                    result.failed_count += 1;
                }
            }
        }

        result
    }
}

/// Backup (if asked) then rename; the backup path is returned even when the rename fails
async fn apply_one(
    suggestion: &Suggestion,
    store: Option<&mut BackupStore>,
) -> Result<(AppliedRename, Option<PathBuf>), (ApplyError, Option<PathBuf>)> {
    let from = &suggestion.original_path;
    let to = &suggestion.new_path;

    if !path_exists(from).await {
        return Err((ApplyError::SourceMissing(from.clone()), None));
    }

    let backup_path = match store {
        Some(store) => {
            let copy = store.backup(from).await.map_err(|source| {
                (
                    ApplyError::Backup {
                        path: from.clone(),
                        source,
                    },
                    None,
                )
            })?;
            Some(copy)
        }
        None => None,
    };

    if path_exists(to).await {
        return Err((ApplyError::TargetExists(to.clone()), backup_path));
    }

    if let Err(source) = tokio::fs::rename(from, to).await {
        return Err((
            ApplyError::Rename {
                from: from.clone(),
                to: to.clone(),
                source,
            },
            backup_path,
        ));
    }

    Ok((
        AppliedRename {
            from: from.clone(),
            to: to.clone(),
        },
        backup_path,
    ))
}

async fn undo_one(applied: &AppliedRename) -> Result<(), ApplyError> {
    if !path_exists(&applied.to).await {
        return Err(ApplyError::SourceMissing(applied.to.clone()));
    }
    if path_exists(&applied.from).await {
        return Err(ApplyError::TargetExists(applied.from.clone()));
    }

    tokio::fs::rename(&applied.to, &applied.from)
        .await
        .map_err(|source| ApplyError::Rename {
            from: applied.to.clone(),
            to: applied.from.clone(),
            source,
        })
}

/// Existence without following symlinks, so a dangling link still counts
async fn path_exists(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}

//! Batch renaming of image and video files from their content.
//!
//! A run scans a directory, classifies each file (vision backend with a
//! filename fallback), renders a filename template per file, resolves name
//! collisions, and hands back suggestions. Applying them is a separate step
//! so callers can review first.

pub mod ai;
pub mod config;
pub mod error;
pub mod execution;
pub mod models;
pub mod naming;
pub mod processing;

use ai::ContentClassifier;
use config::NamerConfig;
use error::{ConfigError, ScanError};
use execution::RenameApplier;
use models::{AppliedRename, ApplyResult, BatchResult, MediaFile, Suggestion, UndoResult};
use naming::NameSynthesizer;
use processing::{BatchCoordinator, MediaScanner, ProgressSink};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Initialize tracing with the `RUST_LOG` env filter
///
/// Default: warn for dependencies, info for this crate.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,asset_namer=info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Which template a run renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateChoice {
    /// A template from `naming_patterns`; unknown names use `default`
    Named(String),
    /// A literal template string
    Custom(String),
}

impl Default for TemplateChoice {
    fn default() -> Self {
        Self::Named(config::DEFAULT_PATTERN.to_string())
    }
}

/// Scanner, coordinator and applier built from one config
pub struct AssetNamer {
    config: NamerConfig,
    scanner: MediaScanner,
    coordinator: BatchCoordinator,
    applier: RenameApplier,
}

impl AssetNamer {
    pub fn new(config: NamerConfig, classifier: Arc<dyn ContentClassifier>) -> Self {
        let scanner = MediaScanner::from_config(&config);
        let coordinator = BatchCoordinator::new(
            classifier,
            NameSynthesizer::new(config.output.clone()),
            &config.processing,
        );
        let applier = RenameApplier::new(config.processing.backup_root.clone());

        Self {
            config,
            scanner,
            coordinator,
            applier,
        }
    }

    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.coordinator = self.coordinator.with_abort_flag(flag);
        self
    }

    pub fn config(&self) -> &NamerConfig {
        &self.config
    }

    pub fn template(&self, choice: &TemplateChoice) -> Result<String, ConfigError> {
        match choice {
            TemplateChoice::Named(name) => {
                if !self.config.naming_patterns.contains_key(name) {
                    tracing::warn!(pattern = %name, "Unknown naming pattern, using default");
                }
                self.config.pattern(name).map(str::to_string)
            }
            TemplateChoice::Custom(template) => Ok(template.clone()),
        }
    }

    pub async fn scan(&self, dir: &Path) -> Result<Vec<MediaFile>, ScanError> {
        self.scanner.scan(dir).await
    }

    pub async fn process(
        &self,
        files: &[MediaFile],
        choice: &TemplateChoice,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<BatchResult, ConfigError> {
        let template = self.template(choice)?;
        Ok(self.coordinator.process(files, &template, progress).await)
    }

    /// Apply with the configured backup setting
    pub async fn apply(&self, suggestions: &[Suggestion], progress: &dyn ProgressSink) -> ApplyResult {
        self.applier
            .apply(suggestions, self.config.processing.backup_originals, progress)
            .await
    }

    pub async fn apply_with_backup(
        &self,
        suggestions: &[Suggestion],
        backup: bool,
        progress: &dyn ProgressSink,
    ) -> ApplyResult {
        self.applier.apply(suggestions, backup, progress).await
    }

    pub async fn undo(&self, renamed: &[AppliedRename]) -> UndoResult {
        self.applier.undo(renamed).await
    }
}

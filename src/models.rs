//! Records passed between pipeline stages.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Kind of media, decided by extension at scan time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

/// A supported file found by the scanner
///
/// Snapshot taken at scan time; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    pub path: PathBuf,
    /// Lowercase extension without the dot
    pub extension: String,
    pub size: u64,
    pub modified: DateTime<Local>,
    pub kind: MediaKind,
}

impl MediaFile {
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    /// File stem, used by the fallback analysis and `{original}`
    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Semantic description of a media file
///
/// Always fully populated; `analyzed` is false when the description came
/// from the filename fallback rather than the classifier backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub description: String,
    pub scene_type: String,
    pub subjects: Vec<String>,
    pub location: String,
    pub action: String,
    pub mood: String,
    pub technical: BTreeMap<String, String>,
    pub analyzed: bool,
    pub is_video: bool,
    /// Only set for videos that were probed successfully
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl AnalysisResult {
    /// Degraded analysis built only from the file's own name and kind
    pub fn fallback(path: &Path, is_video: bool) -> Self {
        Self {
            description: file_stem(path),
            scene_type: if is_video { "video" } else { "image" }.to_string(),
            subjects: Vec::new(),
            location: "unknown".to_string(),
            action: "unknown".to_string(),
            mood: "unknown".to_string(),
            technical: BTreeMap::new(),
            analyzed: false,
            is_video,
            duration_secs: None,
        }
    }
}

/// Filesystem facts captured for each processed file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub modified: DateTime<Local>,
    pub size: u64,
    pub size_mb: f64,
    pub extension: String,
    /// Original stem (name without extension)
    pub original_name: String,
}

impl FileMetadata {
    pub fn from_std(path: &Path, meta: &std::fs::Metadata) -> Self {
        let modified = meta
            .modified()
            .map(DateTime::<Local>::from)
            .unwrap_or_else(|_| Local::now());
        let size = meta.len();

        Self {
            modified,
            size,
            size_mb: size as f64 / (1024.0 * 1024.0),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
            original_name: file_stem(path),
        }
    }
}

/// Everything a template can draw on for one file
#[derive(Debug, Clone)]
pub struct RenameContext {
    pub metadata: FileMetadata,
    pub analysis: AnalysisResult,
    /// 1-based position in the run's file list
    pub sequence: usize,
    pub project: Option<String>,
}

impl RenameContext {
    pub fn new(metadata: FileMetadata, analysis: AnalysisResult, sequence: usize) -> Self {
        Self {
            metadata,
            analysis,
            sequence,
            project: None,
        }
    }

    pub fn with_project(mut self, project: Option<String>) -> Self {
        self.project = project;
        self
    }
}

/// Proposed rename for one file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub original_name: String,
    pub new_name: String,
    pub sequence: usize,
    pub analysis: AnalysisResult,
    pub metadata: FileMetadata,
}

impl Suggestion {
    /// A suggestion that keeps the current name
    pub fn is_noop(&self) -> bool {
        self.original_path == self.new_path
    }
}

/// A file that could not be turned into a suggestion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    pub path: PathBuf,
    pub sequence: usize,
    pub error: String,
}

/// Outcome of one processing run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// In input order
    pub suggestions: Vec<Suggestion>,
    /// In input order
    pub failures: Vec<FileFailure>,
    /// True when the run stopped early at a batch boundary
    pub cancelled: bool,
}

impl BatchResult {
    /// Number of suggestions produced by the fallback analysis
    pub fn degraded_count(&self) -> usize {
        self.suggestions
            .iter()
            .filter(|s| !s.analysis.analyzed)
            .count()
    }
}

/// A rename that was carried out, kept for undo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedRename {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// A suggestion that could not be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of applying a set of suggestions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub total: usize,
    pub renamed_count: usize,
    pub failed_count: usize,
    /// No-op suggestions, counted as neither renamed nor failed
    pub skipped_count: usize,
    pub backups: Vec<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub renamed: Vec<AppliedRename>,
    pub failures: Vec<ApplyFailure>,
}

/// Outcome of reverting an apply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoResult {
    pub restored_count: usize,
    pub failed_count: usize,
    pub failures: Vec<ApplyFailure>,
}

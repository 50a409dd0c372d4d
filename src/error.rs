//! Error types for each pipeline boundary.
//!
//! Each component has its own error so callers can tell a degraded analysis
//! (never an error, see [`ClassifyError`]) from a skipped file
//! ([`ProcessError`]) from a failed rename ([`ApplyError`]).

use std::path::PathBuf;
use std::time::Duration;

/// Failures inside the content classifier.
///
/// These never escape [`crate::ai::ContentClassifier::classify`]; they are
/// logged and replaced by a fallback analysis.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("failed to read media: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("classification timed out after {0:?}")]
    Timeout(Duration),

    #[error("response contained no usable description")]
    EmptyDescription,

    #[error("video probe failed: {0}")]
    Video(String),

    #[error("worker task failed: {0}")]
    Task(String),
}

/// Failures that exclude a single file from a processing run.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to read metadata for {path:?}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0:?} has no parent directory")]
    NoParent(PathBuf),

    #[error("worker task failed: {0}")]
    Task(String),
}

/// Failures applying a single suggestion.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("source no longer exists: {0:?}")]
    SourceMissing(PathBuf),

    #[error("failed to back up {path:?}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("target already exists: {0:?}")]
    TargetExists(PathBuf),

    #[error("failed to rename {from:?} -> {to:?}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures scanning the input directory as a whole.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("not a directory: {0:?}")]
    NotADirectory(PathBuf),

    #[error("failed to read directory {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("unknown naming pattern: {0}")]
    UnknownPattern(String),
}

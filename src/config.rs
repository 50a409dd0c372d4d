//! Namer configuration
//!
//! Mirrors the on-disk JSON layout (`naming_patterns`, `supported_formats`,
//! `ai_settings`, `processing`, `output`). Every section has defaults, so a
//! missing file or a partial file both load cleanly.
//!
//! Credentials are never part of this config; the API key is handed to
//! [`crate::ai::VisionClientConfig`] by the caller.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the template every config must provide.
pub const DEFAULT_PATTERN: &str = "default";

/// Top-level configuration for a namer run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamerConfig {
    /// Named filename templates, e.g. `default`, `documentary`
    pub naming_patterns: BTreeMap<String, String>,
    pub supported_formats: SupportedFormats,
    pub ai_settings: AiSettings,
    pub processing: ProcessingSettings,
    pub output: OutputSettings,
}

impl Default for NamerConfig {
    fn default() -> Self {
        let naming_patterns = [
            (DEFAULT_PATTERN, "{date}_{description}_{sequence}"),
            ("documentary", "{project}_{scene}_{date}_{number}"),
            ("location_based", "{location}_{subject}_{action}_{counter}"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            naming_patterns,
            supported_formats: SupportedFormats::default(),
            ai_settings: AiSettings::default(),
            processing: ProcessingSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

/// Extension allow-lists, stored with or without the leading dot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportedFormats {
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

impl Default for SupportedFormats {
    fn default() -> Self {
        let to_vec = |exts: &[&str]| exts.iter().map(|e| e.to_string()).collect();
        Self {
            images: to_vec(&[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp"]),
            videos: to_vec(&[".mp4", ".mov", ".avi", ".mkv", ".wmv", ".flv", ".webm"]),
        }
    }
}

impl SupportedFormats {
    /// Normalized (lowercase, dot-less) image extensions
    pub fn image_set(&self) -> HashSet<String> {
        normalize_extensions(&self.images)
    }

    /// Normalized (lowercase, dot-less) video extensions
    pub fn video_set(&self) -> HashSet<String> {
        normalize_extensions(&self.videos)
    }
}

fn normalize_extensions(exts: &[String]) -> HashSet<String> {
    exts.iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Settings for the vision backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// Base URL for an OpenAI-compatible API
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Image detail hint (`low`, `high`, `auto`)
    pub detail_level: String,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 150,
            temperature: 0.7,
            detail_level: "auto".to_string(),
            timeout_secs: 30,
        }
    }
}

impl AiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Batch and filesystem settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    pub batch_size: usize,
    /// Maximum concurrent workers per batch
    pub max_workers: usize,
    pub backup_originals: bool,
    pub max_file_size_mb: f64,
    /// Root under which timestamped backup directories are created
    pub backup_root: PathBuf,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_workers: 4,
            backup_originals: true,
            max_file_size_mb: 100.0,
            backup_root: PathBuf::from("backup"),
        }
    }
}

impl ProcessingSettings {
    /// Size limit in bytes
    pub fn max_file_size_bytes(&self) -> u64 {
        (self.max_file_size_mb.max(0.0) * 1024.0 * 1024.0) as u64
    }
}

/// Name formatting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// strftime-style format for `{date}`
    pub date_format: String,
    /// Zero-pad width for `{sequence}`
    pub sequence_padding: usize,
    pub lowercase_names: bool,
    /// Replacement for spaces; empty leaves spaces alone
    pub replace_spaces: String,
    /// Value for `{project}`
    pub project: Option<String>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".to_string(),
            sequence_padding: 3,
            lowercase_names: false,
            replace_spaces: "_".to_string(),
            project: None,
        }
    }
}

impl NamerConfig {
    /// Default config location (`~/.config/asset-namer/config.json`)
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("asset-namer").join("config.json"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load config from a JSON file, falling back to defaults if it doesn't exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&raw)?;
        config.ensure_default_pattern();
        Ok(config)
    }

    /// Write config as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Add (or replace) a named template and persist the config
    pub fn add_naming_pattern(
        &mut self,
        name: &str,
        pattern: &str,
        path: &Path,
    ) -> Result<(), ConfigError> {
        self.naming_patterns
            .insert(name.to_string(), pattern.to_string());
        self.save(path)
    }

    /// Resolve a named template, falling back to `default`
    pub fn pattern(&self, name: &str) -> Result<&str, ConfigError> {
        self.naming_patterns
            .get(name)
            .or_else(|| self.naming_patterns.get(DEFAULT_PATTERN))
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownPattern(name.to_string()))
    }

    /// User configs may drop the `default` template; restore it
    fn ensure_default_pattern(&mut self) {
        if !self.naming_patterns.contains_key(DEFAULT_PATTERN) {
            if let Some(pattern) = Self::default().naming_patterns.remove(DEFAULT_PATTERN) {
                self.naming_patterns
                    .insert(DEFAULT_PATTERN.to_string(), pattern);
            }
        }
    }
}

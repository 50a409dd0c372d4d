//! Template-driven filename synthesis
//!
//! Templates are plain strings with `{key}` placeholders. Recognized keys:
//!
//! | key | value |
//! |-----|-------|
//! | `date` | file modification time, formatted with `date_format` |
//! | `description` | analysis description |
//! | `sequence`, `number`, `counter` | zero-padded sequence number |
//! | `project` | configured project name, `project` if unset |
//! | `scene` | analysis scene type |
//! | `location` | analysis location |
//! | `subject` | first two subjects joined by `_`, `subject` if none |
//! | `action` | analysis action |
//! | `original` | original file stem |
//!
//! Unknown placeholders are left in the output as literal text.

use crate::config::OutputSettings;
use crate::models::RenameContext;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt::Write;

/// Stem used when nothing survives sanitization
pub const UNTITLED: &str = "untitled";

/// Longest stem we produce, in characters
const MAX_STEM_CHARS: usize = 200;

const FALLBACK_DATE_FORMAT: &str = "%Y-%m-%d";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_]+)\}").expect("placeholder regex is valid"));

static RESERVED_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("reserved-char regex is valid"));

static SEPARATOR_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[_-]{2,}").expect("separator regex is valid"));

/// Builds filename stems from templates and rename contexts
#[derive(Debug, Clone)]
pub struct NameSynthesizer {
    settings: OutputSettings,
    /// `replace_spaces` with reserved characters removed
    separator: String,
}

impl Default for NameSynthesizer {
    fn default() -> Self {
        Self::new(OutputSettings::default())
    }
}

impl NameSynthesizer {
    pub fn new(settings: OutputSettings) -> Self {
        let separator = RESERVED_CHARS
            .replace_all(&settings.replace_spaces, "")
            .into_owned();
        if separator != settings.replace_spaces {
            tracing::warn!(
                replace_spaces = %settings.replace_spaces,
                "Space replacement contains reserved characters, using {:?}",
                separator
            );
        }
        Self {
            settings,
            separator,
        }
    }

    pub fn settings(&self) -> &OutputSettings {
        &self.settings
    }

    /// Render `template` against `ctx` and sanitize the result.
    ///
    /// Pure and infallible: the worst case is [`UNTITLED`].
    pub fn synthesize(&self, template: &str, ctx: &RenameContext) -> String {
        let substituted = PLACEHOLDER.replace_all(template, |caps: &Captures| {
            self.placeholder_value(&caps[1], ctx)
                .unwrap_or_else(|| caps[0].to_string())
        });

        let mut name = sanitize_stem(&substituted);

        if self.settings.lowercase_names {
            name = name.to_lowercase();
        }

        if !self.separator.is_empty() {
            name = name.replace(' ', &self.separator);
        }

        name
    }

    fn placeholder_value(&self, key: &str, ctx: &RenameContext) -> Option<String> {
        let analysis = &ctx.analysis;
        let value = match key {
            "date" => self.format_date(&ctx.metadata.modified),
            "description" => analysis.description.clone(),
            "sequence" | "number" | "counter" => self.format_sequence(ctx.sequence),
            "project" => ctx
                .project
                .clone()
                .or_else(|| self.settings.project.clone())
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| "project".to_string()),
            "scene" => analysis.scene_type.clone(),
            "location" => analysis.location.clone(),
            "subject" => {
                if analysis.subjects.is_empty() {
                    "subject".to_string()
                } else {
                    analysis
                        .subjects
                        .iter()
                        .take(2)
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join("_")
                }
            }
            "action" => analysis.action.clone(),
            "original" => ctx.metadata.original_name.clone(),
            _ => return None,
        };
        Some(value)
    }

    fn format_date(&self, date: &DateTime<Local>) -> String {
        let format = self.settings.date_format.as_str();
        let valid = !StrftimeItems::new(format).any(|item| matches!(item, Item::Error));

        let mut out = String::new();
        if valid && write!(out, "{}", date.format(format)).is_ok() {
            return out;
        }

        tracing::warn!(
            format = %self.settings.date_format,
            "Invalid date format, using {}",
            FALLBACK_DATE_FORMAT
        );
        date.format(FALLBACK_DATE_FORMAT).to_string()
    }

    fn format_sequence(&self, sequence: usize) -> String {
        format!("{:0width$}", sequence, width = self.settings.sequence_padding)
    }
}

/// Strip reserved characters, collapse separator runs, trim, and default.
pub fn sanitize_stem(name: &str) -> String {
    let name = RESERVED_CHARS.replace_all(name, "");
    let name = SEPARATOR_RUNS.replace_all(&name, "_");
    let trimmed = trim_separators(&name);

    let trimmed = if trimmed.chars().count() > MAX_STEM_CHARS {
        let cut: String = trimmed.chars().take(MAX_STEM_CHARS).collect();
        trim_separators(&cut).to_string()
    } else {
        trimmed.to_string()
    };

    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed
    }
}

fn trim_separators(name: &str) -> &str {
    name.trim_matches(|c| c == '_' || c == '-' || c == ' ')
}

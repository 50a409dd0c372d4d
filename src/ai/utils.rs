//! Response parsing for the vision backend
//!
//! The backend is asked for strict JSON but models wrap it in code fences or
//! answer in prose. Parsing goes: JSON object (fenced or raw) with the
//! expected keys, then a heuristic description from the first words of the
//! text. `None` means neither produced anything usable.

use crate::models::AnalysisResult;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Number of leading words used by the free-text heuristic
const HEURISTIC_WORDS: usize = 5;

/// Extract a JSON object from a response that might contain markdown or other text
///
/// Handles:
/// - ```json code blocks
/// - Plain ``` code blocks
/// - Raw JSON objects
pub fn extract_json_object(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let json_start = start + 7;
        if let Some(end) = text[json_start..].find("```") {
            return Some(text[json_start..json_start + end].trim());
        }
    }

    if let Some(start) = text.find("```") {
        let block_start = start + 3;
        let content_start = text[block_start..]
            .find('\n')
            .map(|i| block_start + i + 1)
            .unwrap_or(block_start);
        if let Some(end) = text[content_start..].find("```") {
            let content = text[content_start..content_start + end].trim();
            if content.starts_with('{') {
                return Some(content);
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Shape of a structured reply; any JSON type is accepted for the text fields
#[derive(Deserialize)]
struct RawAnalysis {
    description: Value,
    #[serde(default, alias = "sceneType")]
    scene_type: Value,
    #[serde(default)]
    subjects: Value,
    #[serde(default)]
    location: Value,
    #[serde(default)]
    action: Value,
    #[serde(default)]
    mood: Value,
    #[serde(default)]
    technical: Value,
}

/// Parse a strict JSON analysis; `description` is required
pub fn parse_structured(content: &str) -> Option<AnalysisResult> {
    let json = extract_json_object(content)?;
    let raw: RawAnalysis = serde_json::from_str(json).ok()?;

    let or_default = |value: &Value, default: &str| {
        text_from_value(value).unwrap_or_else(|| default.to_string())
    };

    Some(AnalysisResult {
        description: or_default(&raw.description, "untitled"),
        scene_type: or_default(&raw.scene_type, "general"),
        subjects: subjects_from_value(raw.subjects),
        location: or_default(&raw.location, "unknown"),
        action: or_default(&raw.action, "static"),
        mood: or_default(&raw.mood, "neutral"),
        technical: technical_from_value(raw.technical),
        analyzed: true,
        is_video: false,
        duration_secs: None,
    })
}

/// First few words of free text, lowercased, joined with underscores,
/// with everything except alphanumerics, `_` and `-` removed
pub fn heuristic_description(text: &str) -> String {
    let joined = text
        .split_whitespace()
        .take(HEURISTIC_WORDS)
        .collect::<Vec<_>>()
        .join("_");

    joined
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect::<String>()
        .to_lowercase()
}

/// Structured parse, then heuristic; `None` when both come up empty
pub fn parse_analysis_response(content: &str) -> Option<AnalysisResult> {
    if let Some(result) = parse_structured(content) {
        return Some(result);
    }

    let description = heuristic_description(content);
    if description.trim_matches(|c| c == '_' || c == '-').is_empty() {
        return None;
    }

    Some(AnalysisResult {
        description,
        scene_type: "general".to_string(),
        subjects: Vec::new(),
        location: "unknown".to_string(),
        action: "static".to_string(),
        mood: "neutral".to_string(),
        technical: BTreeMap::new(),
        analyzed: true,
        is_video: false,
        duration_secs: None,
    })
}

/// Text for a scalar-ish field: arrays are joined with spaces, null and blanks are `None`
fn text_from_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::Array(items) => items
            .iter()
            .filter_map(text_from_value)
            .collect::<Vec<_>>()
            .join(" "),
        other => value_to_string(other),
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn subjects_from_value(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn technical_from_value(value: Value) -> BTreeMap<String, String> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect(),
        Value::String(s) if !s.trim().is_empty() => {
            BTreeMap::from([("summary".to_string(), s.trim().to_string())])
        }
        _ => BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object_from_code_block() {
        let text = "Here's the result:\n```json\n{\"description\": \"x\"}\n```\nThat's it.";
        assert_eq!(extract_json_object(text), Some("{\"description\": \"x\"}"));
    }

    #[test]
    fn test_extract_json_object_raw() {
        let text = r#"Result: {"name": "test"} done"#;
        assert_eq!(extract_json_object(text), Some(r#"{"name": "test"}"#));
    }

    #[test]
    fn test_no_json_returns_none() {
        assert!(extract_json_object("No JSON here!").is_none());
        assert!(extract_json_object("} backwards {").is_none());
    }

    #[test]
    fn test_parse_structured_full() {
        let content = r#"{
            "description": "sunset beach",
            "scene_type": "landscape",
            "subjects": ["ocean", "sun", "sand"],
            "location": "coast",
            "action": "waves rolling",
            "mood": "calm",
            "technical": {"lighting": "golden hour", "iso": 100}
        }"#;

        let result = parse_structured(content).unwrap();
        assert_eq!(result.description, "sunset beach");
        assert_eq!(result.scene_type, "landscape");
        assert_eq!(result.subjects, vec!["ocean", "sun", "sand"]);
        assert_eq!(result.technical.get("lighting").unwrap(), "golden hour");
        assert_eq!(result.technical.get("iso").unwrap(), "100");
        assert!(result.analyzed);
    }

    #[test]
    fn test_parse_structured_fills_defaults() {
        let result = parse_structured(r#"{"description": "portrait"}"#).unwrap();
        assert_eq!(result.scene_type, "general");
        assert_eq!(result.location, "unknown");
        assert_eq!(result.action, "static");
        assert_eq!(result.mood, "neutral");
        assert!(result.subjects.is_empty());
        assert!(result.technical.is_empty());
    }

    #[test]
    fn test_parse_structured_requires_description() {
        assert!(parse_structured(r#"{"scene_type": "interview"}"#).is_none());
    }

    #[test]
    fn test_string_subjects_and_technical() {
        let result = parse_structured(
            r#"{"description": "d", "subjects": "dog, ball", "technical": "soft light"}"#,
        )
        .unwrap();
        assert_eq!(result.subjects, vec!["dog", "ball"]);
        assert_eq!(result.technical.get("summary").unwrap(), "soft light");
    }

    #[test]
    fn test_non_string_fields_keep_structured_result() {
        let result = parse_analysis_response(
            r#"{"description": "sunset beach", "scene_type": "landscape", "mood": ["calm", "warm"], "action": null, "location": 42}"#,
        )
        .unwrap();
        assert_eq!(result.description, "sunset beach");
        assert_eq!(result.scene_type, "landscape");
        assert_eq!(result.mood, "calm warm");
        assert_eq!(result.action, "static");
        assert_eq!(result.location, "42");
    }

    #[test]
    fn test_null_description_is_untitled() {
        let result = parse_structured(r#"{"description": null, "scene_type": "interview"}"#).unwrap();
        assert_eq!(result.description, "untitled");
        assert_eq!(result.scene_type, "interview");
    }

    #[test]
    fn test_heuristic_description() {
        assert_eq!(
            heuristic_description("A Dog, running on the beach at dusk."),
            "a_dog_running_on_the"
        );
        assert_eq!(heuristic_description("!!! ???"), "_");
    }

    #[test]
    fn test_free_text_falls_back_to_heuristic() {
        let result = parse_analysis_response("Two kids flying kites outdoors").unwrap();
        assert_eq!(result.description, "two_kids_flying_kites_outdoors");
        assert!(result.analyzed);
    }

    #[test]
    fn test_unusable_text_yields_none() {
        assert!(parse_analysis_response("").is_none());
        assert!(parse_analysis_response("?? !!").is_none());
    }
}

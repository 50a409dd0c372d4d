//! Vision API client
//!
//! Talks to an OpenAI-compatible chat-completions endpoint. One request per
//! still image: a text part carrying the instruction prompt and an
//! `image_url` part carrying the JPEG as a data URL.
//!
//! The client only reports what the backend said. Deciding what to do with a
//! failure (fallback analysis) is the analyzer's job.

use super::prompts::ANALYSIS_PROMPT;
use crate::config::AiSettings;
use crate::error::ClassifyError;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Something that can describe a JPEG image in text
///
/// Implementations return the raw message content; parsing happens in the
/// analyzer so every backend gets the same strict-then-heuristic treatment.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    async fn describe_image(&self, jpeg: &[u8]) -> Result<String, ClassifyError>;
}

/// Explicit client configuration, including credentials
#[derive(Debug, Clone)]
pub struct VisionClientConfig {
    pub api_key: String,
    /// Base URL (default: https://api.openai.com)
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub detail: String,
    /// HTTP-level timeout; the analyzer applies its own per-call timeout too
    pub timeout: Duration,
    pub prompt: String,
}

impl VisionClientConfig {
    pub fn from_settings(api_key: impl Into<String>, settings: &AiSettings) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            detail: settings.detail_level.clone(),
            timeout: settings.timeout(),
            prompt: ANALYSIS_PROMPT.to_string(),
        }
    }
}

impl Default for VisionClientConfig {
    fn default() -> Self {
        Self::from_settings(String::new(), &AiSettings::default())
    }
}

/// Chat-completions client for image description
pub struct OpenAiVisionClient {
    client: Client,
    config: VisionClientConfig,
}

impl OpenAiVisionClient {
    pub fn new(config: VisionClientConfig) -> Result<Self, ClassifyError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &VisionClientConfig {
        &self.config
    }

    fn build_request(&self, jpeg: &[u8]) -> ChatRequest {
        let data_url = format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(jpeg)
        );

        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: self.config.prompt.clone(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrlContent {
                            url: data_url,
                            detail: self.config.detail.clone(),
                        },
                    },
                ],
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }
}

#[async_trait]
impl VisionBackend for OpenAiVisionClient {
    async fn describe_image(&self, jpeg: &[u8]) -> Result<String, ClassifyError> {
        let request = self.build_request(jpeg);

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        extract_message_content(&text)
    }
}

/// Pull `choices[0].message.content` out of a completion body
fn extract_message_content(body: &str) -> Result<String, ClassifyError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ClassifyError::MalformedResponse(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ClassifyError::MalformedResponse("no message content".to_string()))
}

// API request/response types

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrlContent },
}

#[derive(Serialize)]
struct ImageUrlContent {
    url: String,
    detail: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

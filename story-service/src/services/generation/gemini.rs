//! Gemini generation client.
//!
//! Talks to the `generateContent` REST method. A request without history is
//! sent as a single turn; a request with history is sent as a chat whose
//! contents are the prior turns followed by the new prompt.

use super::{GenerationClient, GenerationError};
use crate::config::{GeminiSettings, GenerationSettings};
use crate::models::GenerationRequest;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

/// Harm categories filtered on every request.
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

/// Finish reasons that mean the output was withheld by policy.
const BLOCKING_FINISH_REASONS: [&str; 4] = ["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Secret<String>,
    pub model: String,
    pub api_base: String,
    pub sampling: GenerationSettings,
}

impl GeminiConfig {
    pub fn new(gemini: &GeminiSettings, sampling: &GenerationSettings) -> Self {
        Self {
            api_key: gemini.api_key.clone(),
            model: gemini.model.clone(),
            api_base: gemini.api_base.trim_end_matches('/').to_string(),
            sampling: sampling.clone(),
        }
    }
}

/// Stateless Gemini client; each call builds its request from scratch.
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        let client = Client::builder().build().map_err(|e| {
            GenerationError::Unavailable(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base, self.config.model
        )
    }

    fn build_generation_config(&self, max_output_tokens: u32) -> GenerationConfig {
        GenerationConfig {
            temperature: self.config.sampling.temperature,
            top_p: self.config.sampling.top_p,
            top_k: self.config.sampling.top_k,
            max_output_tokens,
        }
    }

    fn build_request(&self, request: &GenerationRequest) -> GenerateContentRequest {
        let mut contents: Vec<Content> = request
            .history()
            .iter()
            .map(|turn| Content::text(turn.role.as_str(), &turn.content))
            .collect();
        contents.push(Content::text("user", request.prompt()));

        GenerateContentRequest {
            contents,
            generation_config: self.build_generation_config(request.max_output_tokens()),
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category: category.to_string(),
                    threshold: SAFETY_THRESHOLD.to_string(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    fn readiness(&self) -> Result<(), GenerationError> {
        if self.config.api_key.expose_secret().trim().is_empty() {
            return Err(GenerationError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }
        if self.config.model.trim().is_empty() {
            return Err(GenerationError::NotConfigured(
                "Gemini model not configured".to_string(),
            ));
        }
        Ok(())
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.readiness()?;

        let body = self.build_request(request);

        tracing::debug!(
            model = %self.config.model,
            prompt_len = request.prompt().len(),
            history_len = request.history().len(),
            continuation = request.is_continuation(),
            max_output_tokens = request.max_output_tokens(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(self.api_url())
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Upstream {
                status: Some(status.as_u16()),
                message: vendor_error_message(&error_text)
                    .unwrap_or_else(|| format!("Gemini API error {}: {}", status, error_text)),
            });
        }

        let api_response: GenerateContentResponse =
            response.json().await.map_err(|e| GenerationError::Upstream {
                status: Some(status.as_u16()),
                message: format!("Failed to parse response: {}", e),
            })?;

        extract_text(api_response)
    }
}

/// Pull the vendor's `error.message` out of an error body, if it has one.
fn vendor_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.is_empty())
}

/// First candidate's first text part, or the reason there is none.
fn extract_text(response: GenerateContentResponse) -> Result<String, GenerationError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        tracing::warn!(block_reason = %reason, "Gemini blocked the prompt");
        return Err(GenerationError::ContentBlocked(reason));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(GenerationError::EmptyResponse)?;

    let text = candidate
        .content
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text);

    match (text, candidate.finish_reason) {
        (Some(text), _) => Ok(text),
        (None, Some(reason)) if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) => {
            tracing::warn!(finish_reason = %reason, "Gemini withheld the output");
            Err(GenerationError::ContentBlocked(reason))
        }
        (None, _) => Err(GenerationError::EmptyResponse),
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

//! Conversation primitives passed from the HTTP layer to the generation client.

use crate::services::generation::GenerationError;
use serde::{Deserialize, Serialize};

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "assistant")]
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One message of prior conversation.
///
/// Accepted as `{role, content}` or in Gemini's own shape
/// `{role, parts: [{text}]}`, where the first part's text is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TurnInput")]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

#[derive(Deserialize)]
struct TurnInput {
    role: Role,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    parts: Vec<TurnPart>,
}

#[derive(Deserialize)]
struct TurnPart {
    #[serde(default)]
    text: Option<String>,
}

impl TryFrom<TurnInput> for Turn {
    type Error = String;

    fn try_from(input: TurnInput) -> Result<Self, Self::Error> {
        let content = input
            .content
            .or_else(|| input.parts.into_iter().next().and_then(|part| part.text))
            .ok_or_else(|| "history turn needs `content` or `parts[0].text`".to_string())?;

        Ok(Self {
            role: input.role,
            content,
        })
    }
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

/// A validated request for the generation client.
///
/// `prompt` is never blank and `max_output_tokens` is never zero; the only way
/// to build one is [`GenerationRequest::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    prompt: String,
    history: Vec<Turn>,
    max_output_tokens: u32,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        history: Vec<Turn>,
        max_output_tokens: u32,
    ) -> Result<Self, GenerationError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "Prompt is required.".to_string(),
            ));
        }
        if max_output_tokens == 0 {
            return Err(GenerationError::InvalidRequest(
                "Maximum output length must be greater than zero.".to_string(),
            ));
        }

        Ok(Self {
            prompt,
            history,
            max_output_tokens,
        })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Prior turns, oldest first.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    /// Whether the request continues an existing conversation.
    pub fn is_continuation(&self) -> bool {
        !self.history.is_empty()
    }
}

use crate::models::Turn;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Largest `length` a caller may request.
pub const MAX_OUTPUT_LENGTH: u32 = 8192;

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct GenerateStoryRequest {
    #[serde(default)]
    pub prompt: Option<String>,

    /// Maximum output tokens; the configured default applies when absent.
    #[serde(default)]
    #[validate(range(min = 1, max = MAX_OUTPUT_LENGTH))]
    pub length: Option<u32>,

    /// Prior turns, oldest first.
    #[serde(default)]
    pub history: Option<Vec<Turn>>,
}

impl GenerateStoryRequest {
    /// The prompt, if present and not blank.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateStoryResponse {
    pub text: String,
}

//! Mock generation client for testing.

use super::{GenerationClient, GenerationError};
use crate::models::GenerationRequest;
use async_trait::async_trait;
use std::sync::Mutex;

/// What the mock answers with.
#[derive(Debug, Clone)]
enum Reply {
    Echo,
    Fixed(String),
    Fail(GenerationError),
    Panic(String),
}

/// Mock client that records every request it receives.
pub struct MockGenerationClient {
    ready: bool,
    reply: Reply,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerationClient {
    /// Answers `Mock story for: <prompt>`.
    pub fn new() -> Self {
        Self {
            ready: true,
            reply: Reply::Echo,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            reply: Reply::Fixed(text.into()),
            ..Self::new()
        }
    }

    pub fn failing(error: GenerationError) -> Self {
        Self {
            reply: Reply::Fail(error),
            ..Self::new()
        }
    }

    /// Panics inside `generate`, for exercising the server's panic boundary.
    pub fn panicking(message: impl Into<String>) -> Self {
        Self {
            reply: Reply::Panic(message.into()),
            ..Self::new()
        }
    }

    pub fn not_ready() -> Self {
        Self {
            ready: false,
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Default for MockGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationClient for MockGenerationClient {
    fn readiness(&self) -> Result<(), GenerationError> {
        if self.ready {
            Ok(())
        } else {
            Err(GenerationError::NotConfigured(
                "Mock generation client not enabled".to_string(),
            ))
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.readiness()?;

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }

        match &self.reply {
            Reply::Echo => Ok(format!("Mock story for: {}", request.prompt())),
            Reply::Fixed(text) => Ok(text.clone()),
            Reply::Fail(err) => Err(err.clone()),
            Reply::Panic(message) => panic!("{}", message),
        }
    }
}

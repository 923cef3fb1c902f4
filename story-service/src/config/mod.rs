use crate::dtos::MAX_OUTPUT_LENGTH;
use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

/// Gemini REST root. Overridable so tests can point at a local mock.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Placeholder used outside production when no secret is configured.
const DEV_SESSION_SECRET: &str = "dev-only-session-secret-change-me";

#[derive(Debug, Clone, Deserialize)]
pub struct StoryConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub session: SessionConfig,
    pub gemini: GeminiSettings,
    pub generation: GenerationSettings,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Secret used to sign the session cookie.
    pub secret: Secret<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiSettings {
    /// Empty when unset; generation then reports "not configured".
    pub api_key: Secret<String>,
    pub model: String,
    pub api_base: String,
}

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    /// Used when the caller omits `length`.
    pub default_max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            top_p: 1.0,
            top_k: 1,
            default_max_output_tokens: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origin: String,
}

impl StoryConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = common_config.is_production();
        let defaults = GenerationSettings::default();

        Ok(StoryConfig {
            common: common_config,
            session: SessionConfig {
                secret: Secret::new(get_env("SESSION_SECRET", Some(DEV_SESSION_SECRET), is_prod)?),
            },
            // The key may be absent: the service still starts and reports not-ready.
            gemini: GeminiSettings {
                api_key: Secret::new(env::var("GEMINI_API_KEY").unwrap_or_default()),
                model: get_env("GEMINI_MODEL", Some("gemini-2.0-flash"), is_prod)?,
                api_base: get_env("GEMINI_API_BASE", Some(DEFAULT_GEMINI_API_BASE), false)?,
            },
            generation: GenerationSettings {
                temperature: get_parsed("GENERATION_TEMPERATURE", defaults.temperature)?,
                top_p: get_parsed("GENERATION_TOP_P", defaults.top_p)?,
                top_k: get_parsed("GENERATION_TOP_K", defaults.top_k)?,
                default_max_output_tokens: check_output_length(
                    "GENERATION_DEFAULT_MAX_OUTPUT_TOKENS",
                    get_parsed(
                        "GENERATION_DEFAULT_MAX_OUTPUT_TOKENS",
                        defaults.default_max_output_tokens,
                    )?,
                )?,
            },
            cors: CorsConfig {
                allowed_origin: get_env(
                    "CORS_ALLOWED_ORIGIN",
                    Some("http://localhost:3000"),
                    false,
                )?,
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Output lengths must fall in the same range callers may request.
fn check_output_length(key: &str, value: u32) -> Result<u32, AppError> {
    if (1..=MAX_OUTPUT_LENGTH).contains(&value) {
        Ok(value)
    } else {
        Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be between 1 and {}, got {}",
            key,
            MAX_OUTPUT_LENGTH,
            value
        )))
    }
}

fn get_parsed<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val.trim().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value '{}': {}", key, val, e))
        }),
        Err(_) => Ok(default),
    }
}

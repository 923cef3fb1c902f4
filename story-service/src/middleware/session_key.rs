use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use tower_sessions::Session;
use uuid::Uuid;

/// Session field holding the opaque log key.
pub const SESSION_KEY_FIELD: &str = "story.session_id";

/// Opaque identifier of the caller's session.
///
/// Resolved from the cookie session; on first contact a fresh identifier is
/// minted and stored, which makes the session layer issue the cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey(pub String);

impl SessionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionKey
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| {
                AppError::InternalError(anyhow::anyhow!("Failed to extract session: {}", msg))
            })?;

        let existing: Option<String> = session.get(SESSION_KEY_FIELD).await.map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to read session: {}", e))
        })?;

        let key = match existing {
            Some(key) => key,
            None => {
                let key = Uuid::new_v4().to_string();
                session.insert(SESSION_KEY_FIELD, &key).await.map_err(|e| {
                    AppError::InternalError(anyhow::anyhow!("Failed to write session: {}", e))
                })?;
                tracing::debug!(session_id = %key, "Started new session");
                key
            }
        };

        tracing::Span::current().record("session_id", key.as_str());

        Ok(SessionKey(key))
    }
}

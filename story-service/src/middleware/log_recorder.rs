use crate::models::{GenerationRecord, LogEntry};
use crate::services::metrics::record_log_append;
use crate::startup::{AppState, GENERATE_PATH};
use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

/// Characters of the prompt shown in the "logged" message.
const PROMPT_PREVIEW_CHARS: usize = 50;

/// Append successful generations to the caller's session log.
///
/// Only `POST /api/generate` responses with a 2xx status and a
/// [`GenerationRecord`] in their extensions are recorded. The append runs on
/// its own task, so the response is returned without waiting for the store.
pub async fn record_generation(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let is_generate = req.method() == Method::POST && req.uri().path() == GENERATE_PATH;

    let mut response = next.run(req).await;

    let record = response.extensions_mut().remove::<GenerationRecord>();
    let record = match record {
        Some(record) if is_generate && response.status().is_success() => record,
        _ => return response,
    };

    let store = state.session_store.clone();
    tokio::spawn(async move {
        let entry = LogEntry::from_record(record);
        let session_id = entry.session_id.clone();
        let preview: String = entry.prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();

        match store.append(&session_id, entry).await {
            Ok(()) => {
                record_log_append();
                tracing::info!(
                    session_id = %session_id,
                    prompt = %preview,
                    "Inference logged (in-memory)"
                );
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Failed to append session log");
            }
        }
    });

    response
}

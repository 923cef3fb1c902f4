use crate::dtos::{GenerateStoryRequest, GenerateStoryResponse};
use crate::middleware::SessionKey;
use crate::models::{GenerationRecord, GenerationRequest, SessionLog};
use crate::services::metrics::record_generation;
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;
use std::time::Instant;
use validator::Validate;

/// `POST /api/generate`: relay a prompt (and optional history) to the
/// generation client and return `{ text }`.
pub async fn generate_story(
    State(state): State<AppState>,
    session: SessionKey,
    payload: Result<Json<GenerateStoryRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload.map_err(|rejection| AppError::InvalidInput {
        error: "Invalid request body.".to_string(),
        details: Some(rejection.body_text()),
    })?;

    let prompt = body
        .prompt()
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Prompt is required.")))?
        .to_string();
    body.validate()?;

    let max_output_tokens = body
        .length
        .unwrap_or(state.config.generation.default_max_output_tokens);
    let request = GenerationRequest::new(
        prompt.clone(),
        body.history.clone().unwrap_or_default(),
        max_output_tokens,
    )?;

    let mode = if request.is_continuation() {
        "chat"
    } else {
        "single_turn"
    };

    let started = Instant::now();
    let result = state.generator.generate(&request).await;
    let elapsed = started.elapsed().as_secs_f64();

    let text = match result {
        Ok(text) => {
            record_generation(mode, "success", elapsed);
            text
        }
        Err(e) => {
            record_generation(mode, e.kind(), elapsed);
            tracing::error!(
                session_id = %session.as_str(),
                mode,
                error = %e,
                "Story generation failed"
            );
            return Err(e.into());
        }
    };

    tracing::debug!(
        session_id = %session.as_str(),
        mode,
        output_len = text.len(),
        "Story generated"
    );

    let mut response = Json(GenerateStoryResponse { text: text.clone() }).into_response();
    response.extensions_mut().insert(GenerationRecord {
        session_id: session.0,
        prompt,
        output: text,
        length: body.length,
    });

    Ok(response)
}

/// `GET /api/logs`: the caller's session log, oldest first.
pub async fn get_logs(
    State(state): State<AppState>,
    session: SessionKey,
) -> Result<Json<SessionLog>, AppError> {
    let log = state.session_store.get(session.as_str()).await?;
    Ok(Json(log))
}

use axum::{extract::State, Json};
use joblab_agent::AgentAnswer;
use joblab_core::errors::{ApplicationError, ValidationError};
use serde::Deserialize;
use tracing::info;

use crate::api::{new_correlation_id, reject, ApiResult, AppState};

pub const MAX_PROMPT_CHARS: usize = 4000;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub prompt: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

pub async fn ask(
    State(state): State<AppState>,
    Json(body): Json<AskRequest>,
) -> ApiResult<AgentAnswer> {
    let correlation_id = new_correlation_id();

    let length = body.prompt.chars().count();
    if body.prompt.trim().is_empty() || length > MAX_PROMPT_CHARS {
        let error = ValidationError::MalformedInput(format!(
            "prompt must be between 1 and {MAX_PROMPT_CHARS} characters"
        ));
        return Err(reject(ApplicationError::from(error), &correlation_id));
    }

    let conversation_id = body
        .conversation_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    info!(
        event_name = "api.ask.received",
        correlation_id = %correlation_id,
        conversation_id = %conversation_id,
        prompt_chars = length,
        "ask request received"
    );

    let answer = state
        .runtime
        .ask(&conversation_id, &body.prompt)
        .await
        .map_err(|error| reject(ApplicationError::from(error), &correlation_id))?;
    Ok(Json(answer))
}

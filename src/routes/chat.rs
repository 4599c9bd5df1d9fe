// src/routes/chat.rs
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};

use crate::{
    error::AppError,
    message::{ChatRequest, ChatResponse},
    state::SharedState,
};

pub const NOT_JSON_REPLY: &str = "Request must be JSON.";
pub const EMPTY_INPUT_REPLY: &str = "I didn't understand your input.";

pub async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(payload) = payload.map_err(|rejection| {
        tracing::info!("received non-JSON request: {rejection}");
        AppError::BadRequest(NOT_JSON_REPLY.to_string())
    })?;

    tracing::info!(text = ?payload.text, "received chat request");

    let user_input = payload.text.as_deref().map(str::trim).unwrap_or_default();
    if user_input.is_empty() {
        tracing::info!("no user input provided or input is empty");
        return Err(AppError::BadRequest(EMPTY_INPUT_REPLY.to_string()));
    }

    let reply = state.router.route(user_input).await?;
    Ok(Json(ChatResponse { response: reply }))
}

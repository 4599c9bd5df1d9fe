// src/error.rs
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Generic apology returned whenever routing fails; detail stays in the logs.
pub const ROUTING_ERROR_REPLY: &str = "I'm sorry, there was an error processing your request.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("NLU client was never initialized")]
    NluUnavailable,

    #[error("NLU request failed: {0}")]
    NluRequest(#[from] reqwest::Error),

    #[error("NLU response was malformed: {0}")]
    NluResponse(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "response": msg }))).into_response()
            }
            err => {
                tracing::error!("error processing chat request: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "response": ROUTING_ERROR_REPLY })),
                )
                    .into_response()
            }
        }
    }
}

// src/routes/mod.rs
pub mod chat;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use chat::chat_handler;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub fn create_router() -> Router<SharedState> {
    Router::new()
        .route("/", post(chat_handler))
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
}

async fn route_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "This route is not defined. Please check the API documentation."
        })),
    )
        .into_response()
}

// src/state.rs
use std::sync::Arc;

use crate::services::intent_router::IntentRouter;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub router: IntentRouter,
}

impl AppState {
    pub fn new(router: IntentRouter) -> Self {
        Self { router }
    }
}

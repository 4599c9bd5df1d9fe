use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;

use sage_backend::config::{Config, MODEL_DIR};
use sage_backend::routes;
use sage_backend::services::dialogflow::{DialogflowClient, NluClient};
use sage_backend::services::generation::LocalGenerator;
use sage_backend::services::intent_router::IntentRouter;
use sage_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    // Expensive resources are built exactly once and shared read-only with
    // every request through the router state.
    let generator = Arc::new(
        LocalGenerator::load(MODEL_DIR)
            .with_context(|| format!("failed to load language model from {MODEL_DIR}"))?,
    );

    // A missing NLU client is not fatal: requests fail with a 500 until the
    // credentials are fixed, but the process stays up.
    let nlu: Option<Arc<dyn NluClient>> = match DialogflowClient::new(&config.project_id) {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            tracing::error!("error initializing Dialogflow client: {err:#}");
            None
        }
    };

    let state = Arc::new(AppState::new(IntentRouter::new(nlu, generator)));

    let app = routes::create_router()
        .with_state(state)
        .layer(CorsLayer::very_permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("sage chatbot listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

// src/services/intent_router.rs
//
// Decides, per utterance, between the NLU fulfillment text and the local
// generation fallback.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::AppError;
use crate::services::dialogflow::{NluClient, NluReply};
use crate::services::generation::ReplyGenerator;

/// Fulfillment produced by Dialogflow's default fallback intent. Kept as a
/// secondary check for agents that do not flag their fallback intent.
const NO_INTENT_MARKER: &str = "I didn't get that";

pub struct IntentRouter {
    nlu: Option<Arc<dyn NluClient>>,
    generator: Arc<dyn ReplyGenerator>,
}

impl IntentRouter {
    pub fn new(nlu: Option<Arc<dyn NluClient>>, generator: Arc<dyn ReplyGenerator>) -> Self {
        Self { nlu, generator }
    }

    /// Route one utterance: ask the NLU service first, delegate to the local
    /// model when it has no confident reply. Remote failures propagate to the
    /// handler; they are not retried here.
    pub async fn route(&self, user_input: &str) -> Result<String, AppError> {
        let nlu = self.nlu.as_ref().ok_or(AppError::NluUnavailable)?;

        // Fresh session per request; no history is carried across turns.
        let session_id = Uuid::new_v4().to_string();
        let reply = nlu.detect_intent(&session_id, user_input).await?;
        tracing::info!(fulfillment = %reply.fulfillment_text, "NLU response");

        if needs_generation(&reply) {
            tracing::info!("no recognized intent; generating response with the local model");
            return Ok(self.generator.generate(user_input).await);
        }
        Ok(reply.fulfillment_text)
    }
}

fn needs_generation(reply: &NluReply) -> bool {
    reply.fulfillment_text.is_empty()
        || reply.is_fallback_intent
        || reply.fulfillment_text.contains(NO_INTENT_MARKER)
}

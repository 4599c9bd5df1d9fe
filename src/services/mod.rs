pub mod dialogflow;
pub mod generation;
pub mod intent_router;

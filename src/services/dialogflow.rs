// src/services/dialogflow.rs
//
// REST client for the hosted intent-detection service (Dialogflow v2
// `detectIntent`). One single-shot query per utterance, no multi-turn
// context.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

const DIALOGFLOW_BASE_URL: &str = "https://dialogflow.googleapis.com/v2";
const LANGUAGE_CODE: &str = "en-US";

/// What the router needs out of an NLU response: the suggested reply and
/// whether the service matched anything better than its fallback intent.
#[derive(Debug, Clone, Default)]
pub struct NluReply {
    pub fulfillment_text: String,
    pub is_fallback_intent: bool,
}

/// Seam for the hosted NLU service so tests can substitute a fake.
#[async_trait]
pub trait NluClient: Send + Sync {
    async fn detect_intent(&self, session_id: &str, text: &str) -> Result<NluReply, AppError>;
}

pub struct DialogflowClient {
    client: Client,
    project_id: String,
    access_token: String,
    base_url: String,
}

impl DialogflowClient {
    /// Construct the client once at startup. Failure here is non-fatal for
    /// the process: the caller logs it and leaves the router without an NLU
    /// client, so chat requests fail with a 500 instead.
    pub fn new(project_id: &str) -> Result<Self> {
        let access_token = std::env::var("DIALOGFLOW_ACCESS_TOKEN")
            .context("DIALOGFLOW_ACCESS_TOKEN is not set in environment variables")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            project_id: project_id.to_string(),
            access_token,
            base_url: DIALOGFLOW_BASE_URL.to_string(),
        })
    }
}

#[async_trait]
impl NluClient for DialogflowClient {
    async fn detect_intent(&self, session_id: &str, text: &str) -> Result<NluReply, AppError> {
        let url = format!(
            "{}/projects/{}/agent/sessions/{}:detectIntent",
            self.base_url, self.project_id, session_id
        );

        let body = DetectIntentRequest {
            query_input: QueryInput {
                text: TextInput {
                    text,
                    language_code: LANGUAGE_CODE,
                },
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: DetectIntentResponse = response.json().await?;
        let result = parsed
            .query_result
            .ok_or_else(|| AppError::NluResponse("missing queryResult field".to_string()))?;

        Ok(NluReply {
            fulfillment_text: result.fulfillment_text,
            is_fallback_intent: result.intent.map(|i| i.is_fallback).unwrap_or(false),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentRequest<'a> {
    query_input: QueryInput<'a>,
}

#[derive(Serialize)]
struct QueryInput<'a> {
    text: TextInput<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextInput<'a> {
    text: &'a str,
    language_code: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentResponse {
    #[serde(default)]
    query_result: Option<QueryResult>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct QueryResult {
    #[serde(default)]
    fulfillment_text: String,
    #[serde(default)]
    intent: Option<Intent>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Intent {
    #[serde(default)]
    is_fallback: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_intent_request_uses_dialogflow_field_names() {
        let body = DetectIntentRequest {
            query_input: QueryInput {
                text: TextInput {
                    text: "hello",
                    language_code: LANGUAGE_CODE,
                },
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["queryInput"]["text"]["text"], "hello");
        assert_eq!(json["queryInput"]["text"]["languageCode"], "en-US");
    }

    #[test]
    fn response_parsing_reads_fulfillment_and_fallback_flag() {
        let raw = r#"{
            "queryResult": {
                "fulfillmentText": "Hi there!",
                "intent": { "displayName": "greeting", "isFallback": false }
            }
        }"#;
        let parsed: DetectIntentResponse = serde_json::from_str(raw).unwrap();
        let result = parsed.query_result.unwrap();
        assert_eq!(result.fulfillment_text, "Hi there!");
        assert!(!result.intent.unwrap().is_fallback);
    }

    #[test]
    fn response_parsing_tolerates_missing_fields() {
        let parsed: DetectIntentResponse = serde_json::from_str(r#"{"queryResult": {}}"#).unwrap();
        let result = parsed.query_result.unwrap();
        assert!(result.fulfillment_text.is_empty());
        assert!(result.intent.is_none());
    }
}

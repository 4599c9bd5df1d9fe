// src/config.rs
use std::env;

use anyhow::{Context, Result};

/// Directory holding the GGUF weights and the tokenizer vocabulary, loaded
/// read-only at startup. Not user-configurable.
pub const MODEL_DIR: &str = "./model";

const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct Config {
    pub project_id: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let project_id = env::var("GOOGLE_CLOUD_PROJECT_ID")
            .context("GOOGLE_CLOUD_PROJECT_ID is not set in environment variables")?;

        let port = match env::var("PORT") {
            Ok(raw) => raw.parse().context("PORT must be a valid port number")?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self { project_id, port })
    }
}

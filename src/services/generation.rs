// src/services/generation.rs
//
// Local text generation with a quantized causal language model. Used as the
// fallback when the NLU service has no confident reply for an utterance.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::quantized_llama::ModelWeights;
use candle_transformers::utils::apply_repeat_penalty;
use tokenizers::{PaddingParams, Tokenizer};
use tokio::sync::Mutex;

const THERAPIST_PROMPT: &str =
    "You are a compassionate AI therapist. Respond empathetically to user inquiries.";

/// Marker opening the model's turn in the prompt; everything after its last
/// occurrence in the decoded output is the actual reply.
const TURN_MARKER: &str = "Sage:";

const LOW_INFORMATION_REPLIES: [&str; 2] = ["i don't know", "i'm not sure"];

const CLARIFICATION_REPLY: &str =
    "I'm here to help, but I might need more information to answer your question.";

/// Returned whenever inference fails; generation never surfaces an error.
pub const GENERATION_FAILURE_REPLY: &str = "I'm sorry, I couldn't process your input.";

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub max_new_tokens: usize,
    pub temperature: f64,
    pub top_k: usize,
    pub top_p: f64,
    pub repetition_penalty: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 100,
            temperature: 0.7,
            top_k: 30,
            top_p: 0.8,
            repetition_penalty: 1.5,
        }
    }
}

/// Seam for the chat fallback so tests can substitute a canned generator.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Produce a free-text reply to the user's input. Infallible at this
    /// boundary: internal errors become a fixed apology string.
    async fn generate(&self, user_input: &str) -> String;
}

pub struct LocalGenerator {
    // Forward passes mutate the KV cache, hence the mutex; the weights
    // themselves are never changed after load.
    model: Mutex<ModelWeights>,
    tokenizer: Tokenizer,
    device: Device,
    config: GenerationConfig,
    eos_token_id: u32,
}

impl LocalGenerator {
    /// Load `model.gguf` and `tokenizer.json` from `dir`. Called once at
    /// startup; failure here is fatal for the process.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_config(dir, GenerationConfig::default())
    }

    pub fn load_with_config(dir: impl AsRef<Path>, config: GenerationConfig) -> Result<Self> {
        let dir = dir.as_ref();
        let device = select_device();
        tracing::info!(?device, "loading language model from {}", dir.display());

        let tokenizer_path = dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            anyhow!(
                "failed to load tokenizer from {}: {e}",
                tokenizer_path.display()
            )
        })?;

        let eos_token_id = ["</s>", "<|endoftext|>", "<|end_of_text|>"]
            .iter()
            .find_map(|tok| tokenizer.token_to_id(tok))
            .context("tokenizer defines no end-of-sequence token")?;

        // The base model has no dedicated padding token; pad with EOS.
        let pad_token = tokenizer
            .id_to_token(eos_token_id)
            .unwrap_or_else(|| "</s>".to_string());
        tokenizer.with_padding(Some(PaddingParams {
            pad_id: eos_token_id,
            pad_token,
            ..Default::default()
        }));

        let weights_path = dir.join("model.gguf");
        let mut file = std::fs::File::open(&weights_path)
            .with_context(|| format!("failed to open {}", weights_path.display()))?;
        let content = gguf_file::Content::read(&mut file)
            .with_context(|| format!("failed to read GGUF from {}", weights_path.display()))?;
        let model = ModelWeights::from_gguf(content, &mut file, &device)
            .context("failed to load model weights")?;

        tracing::info!("language model loaded");

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            device,
            config,
            eos_token_id,
        })
    }

    async fn run(&self, user_input: &str) -> Result<String> {
        let prompt = build_prompt(user_input);
        let encoding = self
            .tokenizer
            .encode(prompt.as_str(), true)
            .map_err(|e| anyhow!("tokenizer error: {e}"))?;

        // Sampling is intentionally stochastic; seed from the clock per call.
        let mut logits_processor = LogitsProcessor::from_sampling(
            clock_seed(),
            Sampling::TopKThenTopP {
                k: self.config.top_k,
                p: self.config.top_p,
                temperature: self.config.temperature,
            },
        );

        let mut tokens = encoding.get_ids().to_vec();
        let prompt_len = tokens.len();
        let mut generated: Vec<u32> = Vec::new();

        let mut model = self.model.lock().await;
        for index in 0..self.config.max_new_tokens {
            // First pass feeds the whole prompt, later passes one token at a
            // time against the KV cache.
            let (context, index_pos) = if index == 0 {
                (&tokens[..], 0)
            } else {
                (&tokens[tokens.len() - 1..], tokens.len() - 1)
            };
            let input = Tensor::new(context, &self.device)?.unsqueeze(0)?;
            let logits = model.forward(&input, index_pos)?;
            let logits = logits.squeeze(0)?;

            let logits = if self.config.repetition_penalty == 1.0 {
                logits
            } else {
                apply_repeat_penalty(&logits, self.config.repetition_penalty, &tokens)?
            };

            let next_token = logits_processor.sample(&logits)?;
            if next_token == self.eos_token_id {
                break;
            }
            tokens.push(next_token);
            generated.push(next_token);
        }
        drop(model);

        tracing::debug!(
            prompt_tokens = prompt_len,
            generated_tokens = generated.len(),
            "generation finished"
        );

        let raw = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| anyhow!("tokenizer decode error: {e}"))?;
        Ok(post_process(&raw))
    }
}

#[async_trait]
impl ReplyGenerator for LocalGenerator {
    async fn generate(&self, user_input: &str) -> String {
        match self.run(user_input).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!("error in text generation: {err:#}");
                GENERATION_FAILURE_REPLY.to_string()
            }
        }
    }
}

/// Prefer an accelerated device, fall back to the CPU.
fn select_device() -> Device {
    if candle_core::utils::cuda_is_available() {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }
    if candle_core::utils::metal_is_available() {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }
    Device::Cpu
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(42)
}

/// Fixed few-shot prompt steering the model towards short empathetic turns.
fn build_prompt(user_input: &str) -> String {
    format!(
        "{THERAPIST_PROMPT}\n\
         User: What is the color of the sky?\n\
         Sage: The sky is blue on a clear day.\n\
         User: Why do people feel sad?\n\
         Sage: It's natural to feel sad sometimes. Emotions help us process our experiences.\n\
         User: {user_input}\nSage:"
    )
}

/// Keep only the text after the model's last turn marker, then substitute
/// low-information replies with a request for clarification.
fn post_process(raw: &str) -> String {
    let reply = match raw.rsplit_once(TURN_MARKER) {
        Some((_, tail)) => tail,
        None => raw,
    };
    let reply = reply.trim();

    if LOW_INFORMATION_REPLIES
        .iter()
        .any(|phrase| reply.eq_ignore_ascii_case(phrase))
    {
        return CLARIFICATION_REPLY.to_string();
    }
    reply.to_string()
}

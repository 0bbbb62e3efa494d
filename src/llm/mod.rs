//! LLM integration for Order Assist.
//!
//! Supports:
//! - **Groq**: OpenAI-compatible chat completions via rig-core (default)
//! - **OpenAI**: Direct API access via rig-core
//!
//! The conversation core never talks to a model directly; it goes through
//! the `Extractor` in `conversation::extractor`, which is built on the
//! `LlmProvider` trait. `RigAdapter` bridges rig's `CompletionModel` to it.

pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::str::FromStr;
use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Groq,
    OpenAi,
}

impl FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown backend '{other}', expected groq or openai")),
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.backend {
        LlmBackend::Groq => create_groq_provider(config),
        LlmBackend::OpenAi => create_openai_provider(config),
    }
}

fn create_groq_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::groq;

    let client: groq::Client = groq::Client::new(config.api_key.expose_secret()).map_err(|e| {
        LlmError::RequestFailed {
            provider: "groq".to_string(),
            reason: format!("Failed to create Groq client: {e}"),
        }
    })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using Groq (model: {})", config.model);
    Ok(Arc::new(
        RigAdapter::new(model, &config.model)
            .with_json_params(serde_json::json!({ "response_format": { "type": "json_object" } })),
    ))
}

fn create_openai_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {e}"),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using OpenAI (model: {})", config.model);
    Ok(Arc::new(RigAdapter::new(model, &config.model).with_json_params(
        serde_json::json!({ "text": { "format": { "type": "json_object" } } }),
    )))
}

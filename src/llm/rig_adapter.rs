//! Bridges rig-core's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel, Message};

use super::provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};
use crate::error::LlmError;

/// Wraps any rig completion model.
///
/// System messages become the preamble, the last user message is the
/// prompt, and everything in between is sent as chat history.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    /// Provider-specific parameters that force a single JSON object reply.
    json_params: Option<serde_json::Value>,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            json_params: None,
        }
    }

    /// Parameters merged into requests that ask for JSON output.
    pub fn with_json_params(mut self, params: serde_json::Value) -> Self {
        self.json_params = Some(params);
        self
    }
}

/// Preamble, history and prompt for a rig request.
struct RigPrompt {
    preamble: Option<String>,
    history: Vec<Message>,
    prompt: Message,
}

fn split_messages(messages: &[ChatMessage]) -> Result<RigPrompt, LlmError> {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let mut turns: Vec<&ChatMessage> = messages.iter().filter(|m| m.role != Role::System).collect();
    let prompt = match turns.pop() {
        Some(last) if last.role == Role::User => Message::user(last.content.clone()),
        _ => {
            return Err(LlmError::RequestFailed {
                provider: "rig".to_string(),
                reason: "request must end with a user message".to_string(),
            });
        }
    };

    let history = turns
        .into_iter()
        .map(|m| match m.role {
            Role::Assistant => Message::assistant(m.content.clone()),
            _ => Message::user(m.content.clone()),
        })
        .collect();

    Ok(RigPrompt {
        preamble: (!system.is_empty()).then(|| system.join("\n\n")),
        history,
        prompt,
    })
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let RigPrompt {
            preamble,
            history,
            prompt,
        } = split_messages(&request.messages)?;

        let mut builder = self.model.completion_request(prompt).messages(history);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(t) = request.temperature {
            builder = builder.temperature(f64::from(t));
        }
        if let Some(n) = request.max_tokens {
            builder = builder.max_tokens(u64::from(n));
        }
        if request.json_output {
            if let Some(params) = &self.json_params {
                builder = builder.additional_params(params.clone());
            }
        }

        tracing::debug!(model = %self.model_name, "LLM completion request");
        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: e.to_string(),
        })?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect();
        if content.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "response contained no text".to_string(),
            });
        }

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        })
    }
}

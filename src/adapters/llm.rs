use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::{Conversation, ReviewError};

/// Model identifiers served by the hosted OpenAI API. Anything else is
/// treated as a self-hosted model.
pub static HOSTED_MODELS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "gpt-3.5-turbo",
        // 16k context window, for diffs too large for the default model
        "gpt-3.5-turbo-16k",
        "gpt-3.5-turbo-0301",
        "gpt-4",
    ])
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Hosted,
    SelfHosted,
}

impl ModelKind {
    /// Exact, case-sensitive membership test; no prefix matching.
    pub fn for_model(model_name: &str) -> Self {
        if HOSTED_MODELS.contains(model_name) {
            ModelKind::Hosted
        } else {
            ModelKind::SelfHosted
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub api_key: Option<String>,
    /// Override for the hosted API root.
    pub hosted_base_url: Option<String>,
    /// Root of the self-hosted server; `/v1/chat/completions` is appended.
    pub self_hosted_url: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: "gpt-3.5-turbo".to_string(),
            api_key: None,
            hosted_base_url: None,
            self_hosted_url: None,
            temperature: 0.7,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub model: String,
    /// Only present when the backend reports token accounting.
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    /// Send the whole conversation and return the generated reply.
    async fn complete(&self, conversation: &Conversation) -> Result<LLMResponse, ReviewError>;
    fn model_name(&self) -> &str;
}

pub fn create_adapter(config: &ModelConfig) -> Result<Box<dyn LLMAdapter>, ReviewError> {
    match ModelKind::for_model(&config.model_name) {
        ModelKind::Hosted => Ok(Box::new(crate::adapters::OpenAIAdapter::new(
            config.clone(),
        )?)),
        ModelKind::SelfHosted => Ok(Box::new(crate::adapters::SelfHostedAdapter::new(
            config.clone(),
        )?)),
    }
}

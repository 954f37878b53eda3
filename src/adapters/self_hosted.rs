use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::adapters::llm::{LLMAdapter, LLMResponse, ModelConfig};
use crate::core::{Conversation, Message, ReviewError};

/// Locally deployed model behind an OpenAI-compatible chat endpoint.
///
/// These servers don't report token usage, so responses never carry any.
pub struct SelfHostedAdapter {
    client: Client,
    config: ModelConfig,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
}

impl SelfHostedAdapter {
    pub fn new(config: ModelConfig) -> Result<Self, ReviewError> {
        let base_url = config
            .self_hosted_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                ReviewError::Configuration(format!(
                    "llm_url is required for the self-hosted model {}",
                    config.model_name
                ))
            })?
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReviewError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }
}

#[async_trait]
impl LLMAdapter for SelfHostedAdapter {
    async fn complete(&self, conversation: &Conversation) -> Result<LLMResponse, ReviewError> {
        conversation.ensure_sendable()?;

        let request = ChatRequest {
            model: &self.config.model_name,
            messages: conversation.messages(),
            temperature: self.config.temperature,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReviewError::BackendUnavailable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReviewError::BackendUnavailable(format!(
                "self-hosted LLM error ({status}): {body}"
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            ReviewError::MalformedResponse(format!("self-hosted LLM returned invalid JSON: {e}"))
        })?;

        let content = body
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                ReviewError::MalformedResponse(format!("missing choices[0].message.content: {body}"))
            })?;

        Ok(LLMResponse {
            content: content.to_string(),
            model: self.config.model_name.clone(),
            usage: None,
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::adapters::llm::{LLMAdapter, LLMResponse, ModelConfig, Usage};
use crate::core::{Conversation, Message, ReviewError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Hosted OpenAI chat-completions backend.
pub struct OpenAIAdapter {
    client: Client,
    config: ModelConfig,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
    usage: Option<OpenAIUsage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

impl OpenAIAdapter {
    pub fn new(config: ModelConfig) -> Result<Self, ReviewError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ReviewError::CredentialMissing("OPENAI_API_KEY".to_string()))?;

        let base_url = config
            .hosted_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReviewError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            api_key,
            base_url,
        })
    }
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    async fn complete(&self, conversation: &Conversation) -> Result<LLMResponse, ReviewError> {
        conversation.ensure_sendable()?;

        let request = OpenAIRequest {
            model: &self.config.model_name,
            messages: conversation.messages(),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ReviewError::BackendUnavailable(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ReviewError::BackendUnavailable(format!(
                "OpenAI API error ({status}): {error_text}"
            )));
        }

        let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
            ReviewError::MalformedResponse(format!("failed to parse OpenAI response: {e}"))
        })?;

        let content = openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                ReviewError::MalformedResponse("OpenAI response has no message content".to_string())
            })?;

        Ok(LLMResponse {
            content,
            model: openai_response
                .model
                .unwrap_or_else(|| self.config.model_name.clone()),
            usage: openai_response.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tillslip_core::{ConfigError, ModelConfig};
use tracing::debug;

use crate::model::{CompletionRequest, LanguageModel, ModelError};

/// Gemini through its OpenAI-compatible chat completions endpoint.
pub struct GeminiModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiModel {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: ModelConfig::default().base_url,
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build from config, reading the API key from the environment.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.api_key()?, &config.model).with_base_url(&config.base_url))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, ModelError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: &request.instruction },
                ChatMessage { role: "user", content: &request.input },
            ],
            stream: false,
        };

        debug!(agent = %request.agent, model = %self.model, "Sending request to Gemini");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status { status: status.as_u16(), body });
        }

        let chat: ChatResponse = response.json().await?;
        Ok(chat.choices.into_iter().next().and_then(|c| c.message.content))
    }
}

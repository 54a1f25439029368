pub mod openai;
pub mod aiml;

use async_trait::async_trait;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use super::{ LlmConfig, LlmType };
use self::openai::OpenAIChatClient;
use self::aiml::AimlChatClient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// Per-call knobs. `model` overrides the client's configured model.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1000,
            temperature: 0.7,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub model: String,
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "healthy" | "available")
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions
    ) -> Result<ChatCompletion, Box<dyn StdError + Send + Sync>>;

    async fn health(&self) -> ProviderHealth;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
    fn llm_type(&self) -> LlmType;
    fn has_api_key(&self) -> bool;
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Aiml => {
            let specific_client = AimlChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

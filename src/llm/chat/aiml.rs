use async_trait::async_trait;
use log::{ debug, info };
use reqwest::Client as HttpClient;
use std::error::Error as StdError;
use std::time::Duration;

use super::openai::{ chat_completions, json_http_client };
use super::{ ChatClient, ChatCompletion, ChatMessage, ChatOptions, ProviderHealth };
use crate::llm::{ LlmConfig, LlmType };

pub const DEFAULT_BASE_URL: &str = "http://localhost:8001";
pub const DEFAULT_MODEL: &str = "default";

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Self-hosted OpenAI-compatible endpoint. The API key is optional.
pub struct AimlChatClient {
    http: HttpClient,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl AimlChatClient {
    pub fn new(
        api_key: Option<String>,
        model: Option<String>,
        base_url: Option<String>
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Ok(Self {
            http: json_http_client()?,
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Self::new(config.api_key.clone(), config.completion_model.clone(), config.base_url.clone())
    }
}

#[async_trait]
impl ChatClient for AimlChatClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions
    ) -> Result<ChatCompletion, Box<dyn StdError + Send + Sync>> {
        info!("AIML chat request: base_url={}, model={}", self.base_url, self.model);
        chat_completions(
            &self.http,
            &self.base_url,
            self.api_key.as_deref(),
            &self.model,
            messages,
            options
        ).await
    }

    async fn health(&self) -> ProviderHealth {
        let url = format!("{}/health", self.base_url.trim_end_matches('/'));
        match self.http.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(resp) if resp.status().is_success() =>
                ProviderHealth {
                    status: "healthy".to_string(),
                    model: Some(self.model.clone()),
                    error: None,
                },
            Ok(resp) =>
                ProviderHealth {
                    status: "unhealthy".to_string(),
                    model: Some(self.model.clone()),
                    error: Some(format!("Health endpoint returned {}", resp.status())),
                },
            Err(e) => {
                debug!("AIML health probe failed: {}", e);
                ProviderHealth {
                    status: "unhealthy".to_string(),
                    model: Some(self.model.clone()),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }

    fn llm_type(&self) -> LlmType {
        LlmType::Aiml
    }

    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

use async_trait::async_trait;
use log::{ info, warn };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;

use super::{ ChatClient, ChatCompletion, ChatMessage, ChatOptions, ProviderHealth };
use crate::llm::{ LlmConfig, LlmType };

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4";

pub struct OpenAIChatClient {
    http: HttpClient,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    total_tokens: u32,
}

/// Posts to `{base_url}/v1/chat/completions` and extracts the first choice.
/// Shared by every OpenAI-compatible provider.
pub async fn chat_completions(
    http: &HttpClient,
    base_url: &str,
    api_key: Option<&str>,
    model: &str,
    messages: &[ChatMessage],
    options: &ChatOptions
) -> Result<ChatCompletion, Box<dyn StdError + Send + Sync>> {
    let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
    let model = options.model.as_deref().unwrap_or(model);

    let req = OpenAIChatRequest {
        model,
        messages,
        temperature: options.temperature,
        max_tokens: options.max_tokens,
    };

    let mut builder = http.post(&url).timeout(options.timeout).json(&req);
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", key));
    }

    let resp = builder.send().await?.error_for_status()?.json::<OpenAIResponse>().await?;

    let content = resp.choices
        .into_iter()
        .next()
        .ok_or_else(|| "No response from chat completion API".to_string())?
        .message.content;

    Ok(ChatCompletion {
        content,
        model: resp.model.unwrap_or_else(|| model.to_string()),
        total_tokens: resp.usage.map(|u| u.total_tokens),
    })
}

pub(crate) fn json_http_client() -> Result<HttpClient, Box<dyn StdError + Send + Sync>> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    HttpClient::builder()
        .default_headers(headers)
        .build()
        .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)
}

impl OpenAIChatClient {
    pub fn new(
        api_key: Option<String>,
        model: Option<String>,
        base_url: Option<String>
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let model = model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = base_url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = api_key.filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("OpenAI API key not configured; chat requests will use fallback replies");
        }

        Ok(Self {
            http: json_http_client()?,
            api_key,
            model,
            base_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Self::new(config.api_key.clone(), config.completion_model.clone(), config.base_url.clone())
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions
    ) -> Result<ChatCompletion, Box<dyn StdError + Send + Sync>> {
        let api_key = self.api_key
            .as_deref()
            .ok_or_else(|| "OpenAI API key not configured".to_string())?;
        info!("OpenAI chat request: model={}, messages={}", self.model, messages.len());
        chat_completions(&self.http, &self.base_url, Some(api_key), &self.model, messages, options).await
    }

    async fn health(&self) -> ProviderHealth {
        if self.api_key.is_some() {
            ProviderHealth {
                status: "healthy".to_string(),
                model: Some(self.model.clone()),
                error: None,
            }
        } else {
            ProviderHealth {
                status: "unhealthy".to_string(),
                model: Some(self.model.clone()),
                error: Some("OpenAI API key not configured".to_string()),
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
        LlmType::OpenAI
    }

    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let client = OpenAIChatClient::new(None, None, None).unwrap();
        assert_eq!(client.get_model(), DEFAULT_MODEL);
        assert_eq!(client.get_base_url().as_deref(), Some(DEFAULT_BASE_URL));

        let err = client
            .chat(&[ChatMessage::user("hello")], &ChatOptions::default()).await
            .unwrap_err();
        assert_eq!(err.to_string(), "OpenAI API key not configured");
        assert!(!client.health().await.is_healthy());
    }

    #[test]
    fn response_parsing_tolerates_missing_usage() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#;
        let parsed: OpenAIResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.usage.is_none());
        assert_eq!(parsed.choices[0].message.content, "hi");
    }
}

use log::info;
use serde::{ Deserialize, Serialize };
use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::chat::{ self, ChatClient, ProviderHealth };
use super::{ openai_defaults, aiml_defaults, LlmConfig, LlmType };
use crate::cli::Args;

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl ProviderSettings {
    fn to_llm_config(&self, llm_type: LlmType) -> LlmConfig {
        LlmConfig {
            llm_type,
            api_key: self.api_key.clone(),
            completion_model: Some(self.model.clone()),
            base_url: Some(self.base_url.clone()),
        }
    }

    fn apply(&mut self, overrides: &ProviderOverrides) {
        if let Some(key) = &overrides.api_key {
            self.api_key = Some(key.clone()).filter(|k| !k.is_empty());
        }
        if let Some(model) = overrides.model.as_ref().filter(|m| !m.is_empty()) {
            self.model = model.clone();
        }
        if let Some(url) = overrides.base_url.as_ref().filter(|u| !u.is_empty()) {
            self.base_url = url.clone();
        }
    }
}

/// Partial settings accepted by `POST /api/config/ai`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderOverrides {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderConfigView {
    pub model: String,
    pub base_url: String,
    pub api_key_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AiConfigView {
    pub provider: String,
    pub config: ProviderConfigView,
}

struct ManagerState {
    provider: LlmType,
    settings: HashMap<LlmType, ProviderSettings>,
    client: Arc<dyn ChatClient>,
}

/// Holds the active chat provider and lets it be swapped at runtime.
pub struct AiManager {
    state: RwLock<ManagerState>,
}

impl AiManager {
    pub fn from_args(args: &Args) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let provider: LlmType = args.ai_provider.parse()?;
        let mut settings = HashMap::new();
        settings.insert(LlmType::OpenAI, ProviderSettings {
            api_key: Some(args.openai_api_key.clone()).filter(|k| !k.is_empty()),
            model: args.openai_model.clone(),
            base_url: args.openai_base_url.clone(),
        });
        settings.insert(LlmType::Aiml, ProviderSettings {
            api_key: Some(args.aiml_api_key.clone()).filter(|k| !k.is_empty()),
            model: args.aiml_model.clone(),
            base_url: args.aiml_base_url.clone(),
        });

        let client = Self::build_client(provider, &settings)?;
        Ok(Self {
            state: RwLock::new(ManagerState { provider, settings, client }),
        })
    }

    /// Wraps an already-built client, mainly for tests with fake providers.
    pub fn with_client(client: Arc<dyn ChatClient>) -> Self {
        let provider = client.llm_type();
        let mut settings = HashMap::new();
        settings.insert(LlmType::OpenAI, openai_defaults());
        settings.insert(LlmType::Aiml, aiml_defaults());
        settings.insert(provider, ProviderSettings {
            api_key: None,
            model: client.get_model(),
            base_url: client.get_base_url().unwrap_or_default(),
        });
        Self {
            state: RwLock::new(ManagerState { provider, settings, client }),
        }
    }

    fn build_client(
        provider: LlmType,
        settings: &HashMap<LlmType, ProviderSettings>
    ) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
        let config = settings
            .get(&provider)
            .map(|s| s.to_llm_config(provider))
            .unwrap_or_else(|| LlmConfig { llm_type: provider, ..LlmConfig::default() });
        chat::new_client(&config)
    }

    pub async fn client(&self) -> Arc<dyn ChatClient> {
        self.state.read().await.client.clone()
    }

    pub async fn provider(&self) -> LlmType {
        self.state.read().await.provider
    }

    pub async fn set_provider(
        &self,
        name: &str,
        overrides: Option<ProviderOverrides>
    ) -> Result<AiConfigView, Box<dyn StdError + Send + Sync>> {
        let provider: LlmType = name.parse()?;
        let mut state = self.state.write().await;

        let mut settings = state.settings.clone();
        if let Some(overrides) = overrides {
            settings
                .entry(provider)
                .or_insert_with(|| match provider {
                    LlmType::OpenAI => openai_defaults(),
                    LlmType::Aiml => aiml_defaults(),
                })
                .apply(&overrides);
        }

        let client = Self::build_client(provider, &settings)?;
        state.settings = settings;
        state.provider = provider;
        state.client = client;
        info!("AI provider switched to {}", provider);

        Ok(Self::view(&state))
    }

    pub async fn get_config(&self) -> AiConfigView {
        Self::view(&*self.state.read().await)
    }

    fn view(state: &ManagerState) -> AiConfigView {
        let client = &state.client;
        AiConfigView {
            provider: state.provider.to_string(),
            config: ProviderConfigView {
                model: client.get_model(),
                base_url: client.get_base_url().unwrap_or_default(),
                api_key_configured: client.has_api_key(),
            },
        }
    }

    pub async fn health(&self) -> ProviderHealth {
        let client = self.client().await;
        client.health().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args() -> Args {
        Args::parse_from(["safechild-backend", "--openai-api-key", "sk-secret"])
    }

    #[tokio::test]
    async fn config_never_exposes_the_key() {
        let manager = AiManager::from_args(&args()).unwrap();
        let view = manager.get_config().await;
        assert_eq!(view.provider, "openai");
        assert!(view.config.api_key_configured);
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("sk-secret"));
    }

    #[tokio::test]
    async fn switching_applies_overrides() {
        let manager = AiManager::from_args(&args()).unwrap();
        let view = manager
            .set_provider(
                "AIML",
                Some(ProviderOverrides {
                    model: Some("llama".into()),
                    base_url: Some("http://aiml.test:9000".into()),
                    ..Default::default()
                })
            ).await
            .unwrap();
        assert_eq!(view.provider, "aiml");
        assert_eq!(view.config.model, "llama");
        assert_eq!(view.config.base_url, "http://aiml.test:9000");
        assert!(!view.config.api_key_configured);
        assert_eq!(manager.provider().await, LlmType::Aiml);
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected_and_state_kept() {
        let manager = AiManager::from_args(&args()).unwrap();
        let err = manager.set_provider("gemini", None).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported provider"));
        assert_eq!(manager.provider().await, LlmType::OpenAI);
    }
}

pub mod chat;
pub mod manager;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    OpenAI,
    Aiml,
}

impl LlmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmType::OpenAI => "openai",
            LlmType::Aiml => "aiml",
        }
    }
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}
impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmType::OpenAI),
            "aiml" => Ok(LlmType::Aiml),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Unsupported provider: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::OpenAI,
            api_key: None,
            completion_model: None,
            base_url: None,
        }
    }
}

pub(crate) fn openai_defaults() -> manager::ProviderSettings {
    manager::ProviderSettings {
        api_key: None,
        model: chat::openai::DEFAULT_MODEL.to_string(),
        base_url: chat::openai::DEFAULT_BASE_URL.to_string(),
    }
}

pub(crate) fn aiml_defaults() -> manager::ProviderSettings {
    manager::ProviderSettings {
        api_key: None,
        model: chat::aiml::DEFAULT_MODEL.to_string(),
        base_url: chat::aiml::DEFAULT_BASE_URL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_providers_case_insensitively() {
        assert_eq!("OpenAI".parse::<LlmType>(), Ok(LlmType::OpenAI));
        assert_eq!(" aiml ".parse::<LlmType>(), Ok(LlmType::Aiml));
        assert!("ollama".parse::<LlmType>().is_err());
    }
}

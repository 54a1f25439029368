use serde::{ Deserialize, Serialize };

use crate::llm::chat::ChatMessage;
use crate::services::gpt::UserContext;

pub const SESSION_ACTIVE: &str = "active";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub user_id: Option<String>,
    pub created_at: String,
    pub last_activity: String,
    pub message_count: u64,
    pub status: String,
    #[serde(default)]
    pub messages: Vec<SessionMessage>,
}

impl ChatSession {
    pub fn new(session_id: String, user_id: Option<String>, now: &str) -> Self {
        Self {
            session_id,
            user_id,
            created_at: now.to_string(),
            last_activity: now.to_string(),
            message_count: 0,
            status: SESSION_ACTIVE.to_string(),
            messages: Vec::new(),
        }
    }

    /// The transcript as provider messages.
    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|m| ChatMessage { role: m.role.clone(), content: m.content.clone() })
            .collect()
    }

    /// The newest `limit` messages, oldest first.
    pub fn recent(&self, limit: usize) -> &[SessionMessage] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }
}

/// A session without its transcript.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: Option<String>,
    pub created_at: String,
    pub last_activity: String,
    pub message_count: u64,
    pub status: String,
}

impl From<&ChatSession> for SessionSummary {
    fn from(session: &ChatSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            user_id: session.user_id.clone(),
            created_at: session.created_at.clone(),
            last_activity: session.last_activity.clone(),
            message_count: session.message_count,
            status: session.status.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatHistory {
    pub session_id: String,
    pub messages: Vec<SessionMessage>,
    pub total_messages: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_context: Option<UserContext>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ModelInfo {
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
    pub fallback: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    pub session_id: String,
    pub timestamp: String,
    pub message_id: String,
    pub model_info: Option<ModelInfo>,
    pub fallback: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub concern_text: String,
    #[serde(default)]
    pub analysis_type: Option<String>,
}

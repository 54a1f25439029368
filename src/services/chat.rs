use chrono::Utc;
use log::{ info, warn };
use serde::Serialize;
use std::error::Error;
use std::sync::Arc;
use thiserror::Error as ThisError;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::chat::{
    ChatHistory,
    ChatRequest,
    ChatResponse,
    ChatSession,
    ModelInfo,
    SessionMessage,
    SessionSummary,
    SESSION_ACTIVE,
};
use crate::services::gpt::{ ConcernAnalysis, GptService };
use crate::session::SessionStore;
use crate::text::TextCleaner;

#[derive(Debug, ThisError)]
pub enum ChatError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Chat session not found")]
    SessionNotFound,

    #[error("session store error: {0}")]
    Store(Box<dyn Error + Send + Sync>),
}

impl From<Box<dyn Error + Send + Sync>> for ChatError {
    fn from(e: Box<dyn Error + Send + Sync>) -> Self {
        ChatError::Store(e)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionCounts {
    pub active: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageStats {
    pub total: u64,
    pub average_per_session: f64,
}

/// Chatbot conversations persisted through a [`SessionStore`].
pub struct ChatService {
    gpt: Arc<GptService>,
    store: Arc<dyn SessionStore>,
    cleaner: TextCleaner,
    // Serialises read-modify-write cycles on stored sessions.
    write_lock: Mutex<()>,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl ChatService {
    pub fn new(gpt: Arc<GptService>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            gpt,
            store,
            cleaner: TextCleaner::new(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn gpt(&self) -> &Arc<GptService> {
        &self.gpt
    }

    pub fn store_kind(&self) -> &'static str {
        self.store.kind()
    }

    pub async fn chat(&self, req: ChatRequest, user_id: Option<String>) -> Result<ChatResponse, ChatError> {
        if req.message.trim().is_empty() {
            return Err(ChatError::InvalidInput("Message cannot be empty".to_string()));
        }
        let cleaned = self.cleaner.clean(&req.message);
        if cleaned.is_empty() {
            return Err(ChatError::InvalidInput("Message contains invalid content".to_string()));
        }

        let session_id = req.session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // Record the user turn and take the prior transcript for the prompt.
        let history = {
            let _guard = self.write_lock.lock().await;
            let mut session = match self.store.get(&session_id).await? {
                Some(session) => session,
                None => {
                    info!("Starting chat session {}", session_id);
                    ChatSession::new(
                        session_id.clone(),
                        Some(user_id.unwrap_or_else(|| "anonymous".to_string())),
                        &now()
                    )
                }
            };
            let history = session.transcript();
            session.last_activity = now();
            session.message_count += 1;
            session.messages.push(SessionMessage {
                role: "user".to_string(),
                content: cleaned.clone(),
                timestamp: now(),
            });
            self.store.put(&session).await?;
            history
        };

        let reply = self.gpt.chatbot_reply(&cleaned, &history, req.user_context.as_ref()).await;
        if !reply.success {
            warn!(
                "Chat provider failed for session {}: {}",
                session_id,
                reply.error.as_deref().unwrap_or("unknown error")
            );
        }

        {
            let _guard = self.write_lock.lock().await;
            // The session may have been cleared or deleted while the provider was working.
            if let Some(mut session) = self.store.get(&session_id).await? {
                session.messages.push(SessionMessage {
                    role: "assistant".to_string(),
                    content: reply.response.clone(),
                    timestamp: now(),
                });
                self.store.put(&session).await?;
            }
        }

        let message_id = Uuid::new_v4().to_string();
        info!("Chat response generated for session {}, message ID: {}", session_id, message_id);

        Ok(ChatResponse {
            success: reply.success,
            model_info: if reply.success {
                Some(ModelInfo {
                    model: reply.model.clone(),
                    tokens_used: reply.tokens_used,
                    fallback: reply.fallback,
                })
            } else {
                None
            },
            response: reply.response,
            session_id,
            timestamp: now(),
            message_id,
            fallback: reply.fallback,
        })
    }

    pub async fn session(&self, session_id: &str) -> Result<SessionSummary, ChatError> {
        let session = self.store.get(session_id).await?.ok_or(ChatError::SessionNotFound)?;
        Ok(SessionSummary::from(&session))
    }

    pub async fn history(&self, session_id: &str, limit: usize) -> Result<ChatHistory, ChatError> {
        let session = self.store.get(session_id).await?.ok_or(ChatError::SessionNotFound)?;
        Ok(ChatHistory {
            session_id: session.session_id.clone(),
            messages: session.recent(limit).to_vec(),
            total_messages: session.messages.len(),
        })
    }

    pub async fn delete(&self, session_id: &str) -> Result<(), ChatError> {
        let _guard = self.write_lock.lock().await;
        if self.store.delete(session_id).await? {
            info!("Deleted chat session {}", session_id);
            Ok(())
        } else {
            Err(ChatError::SessionNotFound)
        }
    }

    /// Empties the transcript and returns how many messages were removed.
    pub async fn clear(&self, session_id: &str) -> Result<usize, ChatError> {
        let _guard = self.write_lock.lock().await;
        let mut session = self.store.get(session_id).await?.ok_or(ChatError::SessionNotFound)?;
        let removed = session.messages.len();
        session.messages.clear();
        session.message_count = 0;
        self.store.put(&session).await?;
        info!("Cleared chat history for session {}, removed {} messages", session_id, removed);
        Ok(removed)
    }

    /// Most recently active first.
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<SessionSummary>, ChatError> {
        let mut sessions = self.store.list().await?;
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(
            sessions
                .iter()
                .skip(offset)
                .take(limit)
                .map(SessionSummary::from)
                .collect()
        )
    }

    pub async fn analyze(&self, concern_text: &str, analysis_type: &str) -> Result<ConcernAnalysis, ChatError> {
        if concern_text.trim().is_empty() {
            return Err(ChatError::InvalidInput("Concern text cannot be empty".to_string()));
        }
        let cleaned = self.cleaner.clean(concern_text);
        if cleaned.is_empty() {
            return Err(ChatError::InvalidInput("Concern text contains invalid content".to_string()));
        }
        let analysis = self.gpt.analyze_concern(&cleaned, analysis_type).await;
        if !analysis.success {
            warn!("Safety concern analysis failed: {}", analysis.error.as_deref().unwrap_or("unknown error"));
        }
        Ok(analysis)
    }

    pub async fn counts(&self) -> Result<(SessionCounts, MessageStats), ChatError> {
        let sessions = self.store.list().await?;
        let total = sessions.len();
        let active = sessions
            .iter()
            .filter(|s| s.status == SESSION_ACTIVE)
            .count();
        let messages: u64 = sessions
            .iter()
            .map(|s| s.message_count)
            .sum();
        let average = if total == 0 { 0.0 } else { ((messages as f64 / total as f64) * 100.0).round() / 100.0 };
        Ok((
            SessionCounts { active, total },
            MessageStats { total: messages, average_per_session: average },
        ))
    }
}

use async_trait::async_trait;
use std::collections::HashMap;
use std::error::Error;
use tokio::sync::RwLock;

use super::SessionStore;
use crate::models::chat::ChatSession;

/// Process-lifetime sessions.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, ChatSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<ChatSession>, Box<dyn Error + Send + Sync>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn put(&self, session: &ChatSession) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.sessions.write().await.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, Box<dyn Error + Send + Sync>> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }

    async fn list(&self) -> Result<Vec<ChatSession>, Box<dyn Error + Send + Sync>> {
        Ok(self.sessions.read().await.values().cloned().collect())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemorySessionStore::new();
        let session = ChatSession::new("abc".into(), Some("anonymous".into()), "2024-01-01T00:00:00Z");
        store.put(&session).await.unwrap();

        assert_eq!(store.get("abc").await.unwrap().unwrap().session_id, "abc");
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(store.delete("abc").await.unwrap());
        assert!(!store.delete("abc").await.unwrap());
        assert!(store.get("abc").await.unwrap().is_none());
    }
}

use async_trait::async_trait;
use log::error;
use redis::{ AsyncCommands, Client };
use std::error::Error;

use super::SessionStore;
use crate::models::chat::ChatSession;

/// One JSON document per session under `{prefix}{session_id}`.
pub struct RedisSessionStore {
    client: Client,
    key_prefix: String,
    ttl_seconds: Option<u64>,
}

impl RedisSessionStore {
    pub fn new(url: &str, key_prefix: &str, ttl_seconds: Option<u64>) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(Self {
            client: Client::open(url)?,
            key_prefix: key_prefix.to_string(),
            ttl_seconds,
        })
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}{}", self.key_prefix, session_id)
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<ChatSession>, Box<dyn Error + Send + Sync>> {
        let mut conn = self.get_connection().await?;
        let raw: Option<String> = conn.get(self.key(session_id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, session: &ChatSession) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conn = self.get_connection().await?;
        let key = self.key(&session.session_id);
        let json = serde_json::to_string(session)?;
        match self.ttl_seconds {
            Some(ttl) => conn.set_ex::<_, _, ()>(&key, json, ttl).await?,
            None => conn.set::<_, _, ()>(&key, json).await?,
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let mut conn = self.get_connection().await?;
        let removed: i64 = conn.del(self.key(session_id)).await?;
        Ok(removed > 0)
    }

    async fn list(&self) -> Result<Vec<ChatSession>, Box<dyn Error + Send + Sync>> {
        let mut conn = self.get_connection().await?;
        let pattern = format!("{}*", self.key_prefix);
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = conn.scan_match::<_, String>(&pattern).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        let mut sessions = Vec::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = conn.get(&key).await?;
            let Some(json) = raw else {
                continue;
            };
            match serde_json::from_str::<ChatSession>(&json) {
                Ok(session) => sessions.push(session),
                Err(e) => error!("Error parsing stored session {}: {}", key, e),
            }
        }
        Ok(sessions)
    }

    fn kind(&self) -> &'static str {
        "redis"
    }
}

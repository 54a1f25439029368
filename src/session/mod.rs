mod memory;
mod redis;

use async_trait::async_trait;
use log::info;
use std::error::Error;
use std::sync::Arc;

use crate::cli::Args;
use crate::models::chat::ChatSession;

pub use memory::MemorySessionStore;
pub use self::redis::RedisSessionStore;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<ChatSession>, Box<dyn Error + Send + Sync>>;

    /// Inserts or replaces the whole session.
    async fn put(&self, session: &ChatSession) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// `true` when a session was removed.
    async fn delete(&self, session_id: &str) -> Result<bool, Box<dyn Error + Send + Sync>>;

    async fn list(&self) -> Result<Vec<ChatSession>, Box<dyn Error + Send + Sync>>;

    fn kind(&self) -> &'static str;
}

pub fn create_session_store(args: &Args) -> Result<Arc<dyn SessionStore>, Box<dyn Error + Send + Sync>> {
    match args.session_store.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(MemorySessionStore::new())),
        "redis" => {
            let ttl = if args.session_ttl_seconds > 0 { Some(args.session_ttl_seconds) } else { None };
            let store = RedisSessionStore::new(
                &args.session_redis_url,
                &args.session_redis_prefix,
                ttl
            )?;
            Ok(Arc::new(store))
        }
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported session store type: {}", args.session_store)
                    )
                )
            ),
    }
}

pub fn initialize_session_store(args: &Args) -> Result<Arc<dyn SessionStore>, Box<dyn Error + Send + Sync>> {
    if args.session_store.eq_ignore_ascii_case("redis") {
        info!("Chat sessions will be stored in: redis at {}", args.session_redis_url);
    } else {
        info!("Chat sessions will be stored in: {}", args.session_store);
    }
    create_session_store(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn unknown_store_type_is_rejected() {
        let mut args = Args::parse_from(["safechild-backend"]);
        assert_eq!(create_session_store(&args).unwrap().kind(), "memory");
        args.session_store = "sqlite".into();
        let err = create_session_store(&args).err().unwrap();
        assert!(err.to_string().contains("Unsupported session store type"));
    }
}

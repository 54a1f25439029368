pub mod awareness;
pub mod chatbot;
pub mod complaint;
pub mod config;
pub mod emergency;
pub mod middleware;
pub mod system;
pub mod tts;

use axum::http::Uri;
use axum::response::IntoResponse;
use axum::{ http::StatusCode, Json, Router };
use chrono::{ DateTime, Utc };
use governor::{ DefaultDirectRateLimiter, Quota, RateLimiter };
use log::{ error, info, warn };
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::cli::Args;
use crate::llm::manager::AiManager;
use crate::models::awareness::AwarenessCatalogue;
use crate::services::awareness::{ load_catalogue, AwarenessService };
use crate::services::chat::ChatService;
use crate::services::complaint::ComplaintService;
use crate::services::emergency::EmergencyService;
use crate::services::gpt::GptService;
use crate::services::sms::SmsService;
use crate::services::tts::TtsService;
use crate::session::{ initialize_session_store, SessionStore };

pub const AVAILABLE_ROUTES: &[&str] = &[
    "/",
    "/health",
    "/api/status",
    "/api/environment",
    "/api/metrics",
    "/api/chatbot/*",
    "/api/complaint/*",
    "/api/emergency/*",
    "/api/awareness/*",
    "/api/tts/*",
    "/api/config/*",
];

/// The externally-backed pieces of the application. Everything else is
/// built on top of these.
pub struct Components {
    pub ai: Arc<AiManager>,
    pub sms: Arc<SmsService>,
    pub tts: Arc<TtsService>,
    pub sessions: Arc<dyn SessionStore>,
    pub catalogue: AwarenessCatalogue,
}

impl Components {
    pub async fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(Self {
            ai: Arc::new(AiManager::from_args(args)?),
            sms: Arc::new(SmsService::from_args(args)?),
            tts: Arc::new(TtsService::from_args(args).await?),
            sessions: initialize_session_store(args)?,
            catalogue: load_catalogue(args.awareness_path.as_deref())?,
        })
    }
}

/// Audio produced by `POST /api/tts`, kept so it can be fetched again by id.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AudioPayload {
    pub audio_id: String,
    pub audio_data: String,
    pub format: String,
    pub duration: f64,
    pub file_size: usize,
    pub cached: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub args: Arc<Args>,
    pub ai: Arc<AiManager>,
    pub gpt: Arc<GptService>,
    pub chat: Arc<ChatService>,
    pub complaints: Arc<ComplaintService>,
    pub emergencies: Arc<EmergencyService>,
    pub sms: Arc<SmsService>,
    pub tts: Arc<TtsService>,
    pub awareness: Arc<AwarenessService>,
    pub audio: Arc<RwLock<HashMap<String, AudioPayload>>>,
    pub limiter: Arc<DefaultDirectRateLimiter>,
    pub requests: Arc<AtomicU64>,
    pub started_at: DateTime<Utc>,
    pub started: Instant,
}

impl AppState {
    pub fn new(args: Args, components: Components) -> Self {
        let gpt = Arc::new(
            GptService::new(components.ai.clone(), args.openai_max_tokens, args.openai_temperature)
        );
        let per_second = NonZeroU32::new(args.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Self {
            chat: Arc::new(ChatService::new(gpt.clone(), components.sessions)),
            complaints: Arc::new(ComplaintService::new(gpt.clone())),
            emergencies: Arc::new(EmergencyService::new(components.sms.clone())),
            awareness: Arc::new(AwarenessService::new(components.catalogue)),
            ai: components.ai,
            sms: components.sms,
            tts: components.tts,
            gpt,
            audio: Arc::new(RwLock::new(HashMap::new())),
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
            requests: Arc::new(AtomicU64::new(0)),
            started_at: Utc::now(),
            started: Instant::now(),
            args: Arc::new(args),
        }
    }

    pub async fn from_args(args: Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let components = Components::from_args(&args).await?;
        Ok(Self::new(args, components))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(system::routes())
        .merge(chatbot::routes())
        .merge(complaint::routes())
        .merge(emergency::routes())
        .merge(awareness::routes())
        .merge(tts::routes())
        .merge(config::routes())
        .fallback(not_found)
        // Layers run outermost-last: logging sees every request, including rejected ones.
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::trusted_host))
        .layer(middleware::cors_layer(&state.args))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::log_requests))
        .with_state(state)
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    let path = uri.path();
    warn!("404 - Route not found: {}", path);
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": format!("Route '{}' not found", path),
            "available_routes": AVAILABLE_ROUTES,
        })),
    )
}

pub async fn serve(state: AppState) -> Result<(), Box<dyn Error + Send + Sync>> {
    let args = state.args.clone();
    let addr = args.server_addr.parse::<SocketAddr>()?;
    let app = router(state);

    match (args.enable_tls, args.tls_cert_path.as_ref(), args.tls_key_path.as_ref()) {
        (true, Some(cert_path), Some(key_path)) => {
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                cert_path,
                key_path
            ).await?;
            info!("Starting HTTPS server on: https://{}", addr);
            axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
        }
        (true, _, _) => {
            error!("TLS enabled but --tls-cert-path and --tls-key-path were not both given");
            return Err("TLS requires both a certificate and a key path".into());
        }
        _ => {
            let listener = tokio::net::TcpListener
                ::bind(addr).await
                .map_err(|e| format!("Failed to bind HTTP server to {}: {}", addr, e))?;
            info!("Starting HTTP server on: http://{}", addr);
            axum::serve(listener, app.into_make_service()).await?;
        }
    }

    info!("SafeChild backend shutting down");
    Ok(())
}

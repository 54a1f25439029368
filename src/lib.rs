pub mod cache;
pub mod cli;
pub mod error;
pub mod llm;
pub mod models;
pub mod safety;
pub mod server;
pub mod services;
pub mod session;
pub mod text;

use cli::Args;
use log::{ info, warn };
use server::AppState;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("Allowed Origins: {}", args.allowed_origins);
    info!("Allowed Hosts: {}", args.allowed_hosts);
    info!("Requests Per Second: {}", args.requests_per_second);
    info!("AI Provider: {}", args.ai_provider);
    info!("OpenAI Model: {}", args.openai_model);
    info!("AIML Base URL: {}", args.aiml_base_url);
    info!("Twilio Configured: {}", args.twilio_configured());
    info!("SMS Limits: {}/hour, {}/day", args.sms_max_per_hour, args.sms_max_per_day);
    info!("TTS Cache Directory: {}", args.tts_cache_dir);
    info!("TTS Cache Budget: {} MB, TTL {} h", args.tts_max_cache_size_mb, args.tts_cache_ttl_hours);
    info!("Session Store Type: {}", args.session_store);
    if args.session_store.eq_ignore_ascii_case("redis") {
        info!("Session Redis URL: {}", args.session_redis_url);
    }
    info!("Awareness Catalogue: {}", args.awareness_path.as_deref().unwrap_or("built-in"));
    info!("Environment: {} ({})", args.app_env, args.deployment);
    info!("-------------------------");

    let mut missing = Vec::new();
    if args.openai_api_key.is_empty() {
        missing.push("OPENAI_API_KEY");
    }
    if args.twilio_account_sid.is_empty() {
        missing.push("TWILIO_ACCOUNT_SID");
    }
    if args.twilio_auth_token.is_empty() {
        missing.push("TWILIO_AUTH_TOKEN");
    }
    if args.twilio_phone_number.is_empty() {
        missing.push("TWILIO_PHONE_NUMBER");
    }
    if missing.is_empty() {
        info!("All provider credentials are set");
    } else {
        warn!("Missing environment variables: {}", missing.join(", "));
        warn!("Chat replies and SMS will use their fallbacks");
    }

    let state = AppState::from_args(args).await?;
    info!("SafeChild backend is ready");
    server::serve(state).await
}

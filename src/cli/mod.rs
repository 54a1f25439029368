use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:8000")]
    pub server_addr: String,

    /// Comma separated list of origins allowed by CORS. "*" allows any origin.
    #[arg(
        long,
        env = "ALLOWED_ORIGINS",
        default_value = "http://localhost:8501,http://localhost:3000,https://safechild-lite.vercel.app,https://safechild-lite-frontend.vercel.app"
    )]
    pub allowed_origins: String,

    /// Comma separated list of accepted Host headers. Entries may be "*" or "*.domain".
    #[arg(
        long,
        env = "ALLOWED_HOSTS",
        default_value = "localhost,127.0.0.1,0.0.0.0,*.vercel.app,*.railway.app,*.herokuapp.com"
    )]
    pub allowed_hosts: String,

    /// Global ingress budget, in requests per second.
    #[arg(long, env = "REQUESTS_PER_SECOND", default_value = "50")]
    pub requests_per_second: u32,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    /// Deployment label reported by /api/environment (development, production, ...).
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub app_env: String,

    /// Hosting target reported by /api/environment.
    #[arg(long, env = "DEPLOYMENT", default_value = "local")]
    pub deployment: String,

    // --- AI Provider Args ---
    /// Active chat provider (openai, aiml). Can be switched at runtime via /api/config/ai.
    #[arg(long, env = "AI_PROVIDER", default_value = "openai")]
    pub ai_provider: String,

    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    pub openai_api_key: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4")]
    pub openai_model: String,

    /// Base URL of the OpenAI API, without the /v1 path.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com")]
    pub openai_base_url: String,

    #[arg(long, env = "OPENAI_MAX_TOKENS", default_value = "1000")]
    pub openai_max_tokens: u32,

    #[arg(long, env = "OPENAI_TEMPERATURE", default_value = "0.7")]
    pub openai_temperature: f32,

    /// Base URL of the OpenAI-compatible AIML endpoint.
    #[arg(long, env = "AIML_BASE_URL", default_value = "http://localhost:8001")]
    pub aiml_base_url: String,

    #[arg(long, env = "AIML_API_KEY", default_value = "")]
    pub aiml_api_key: String,

    #[arg(long, env = "AIML_MODEL", default_value = "default")]
    pub aiml_model: String,

    // --- Twilio / SMS Args ---
    #[arg(long, env = "TWILIO_ACCOUNT_SID", default_value = "")]
    pub twilio_account_sid: String,

    #[arg(long, env = "TWILIO_AUTH_TOKEN", default_value = "")]
    pub twilio_auth_token: String,

    /// Sender number used for outgoing SMS.
    #[arg(long, env = "TWILIO_PHONE_NUMBER", default_value = "")]
    pub twilio_phone_number: String,

    #[arg(long, env = "TWILIO_BASE_URL", default_value = "https://api.twilio.com")]
    pub twilio_base_url: String,

    /// Messages longer than this are truncated with "...".
    #[arg(long, env = "SMS_MAX_LENGTH", default_value = "160")]
    pub sms_max_length: usize,

    #[arg(long, env = "SMS_DEFAULT_COUNTRY", default_value = "+1")]
    pub sms_default_country: String,

    /// Reported by the usage stats; sends are not retried.
    #[arg(long, env = "SMS_RETRY_ATTEMPTS", default_value = "3")]
    pub sms_retry_attempts: u32,

    #[arg(long, env = "SMS_MAX_PER_HOUR", default_value = "100")]
    pub sms_max_per_hour: u32,

    #[arg(long, env = "SMS_MAX_PER_DAY", default_value = "1000")]
    pub sms_max_per_day: u32,

    /// Pause between consecutive sends of one batch, in milliseconds.
    #[arg(long, env = "SMS_SEND_DELAY_MS", default_value = "500")]
    pub sms_send_delay_ms: u64,

    // --- TTS Args ---
    #[arg(long, env = "TTS_DEFAULT_LANGUAGE", default_value = "en")]
    pub tts_default_language: String,

    #[arg(long, env = "TTS_DEFAULT_SLOW", default_value = "false")]
    pub tts_default_slow: bool,

    #[arg(long, env = "TTS_AUDIO_FORMAT", default_value = "mp3")]
    pub tts_audio_format: String,

    /// Directory holding cached audio files.
    #[arg(long, env = "TTS_CACHE_DIR", default_value = "temp/audio_cache")]
    pub tts_cache_dir: String,

    #[arg(long, env = "TTS_MAX_CACHE_SIZE_MB", default_value = "100")]
    pub tts_max_cache_size_mb: u64,

    #[arg(long, env = "TTS_CACHE_TTL_HOURS", default_value = "24")]
    pub tts_cache_ttl_hours: u64,

    /// Speech synthesis endpoint (Google Translate TTS).
    #[arg(long, env = "TTS_BASE_URL", default_value = "https://translate.google.com/translate_tts")]
    pub tts_base_url: String,

    // --- Session Store Args ---
    /// Chat session store type (memory, redis)
    #[arg(long, env = "SESSION_STORE", default_value = "memory")]
    pub session_store: String,

    /// Redis endpoint for the session store (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "SESSION_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub session_redis_url: String,

    /// Prefix for Redis session keys.
    #[arg(long, env = "SESSION_REDIS_PREFIX", default_value = "safechild:session:")]
    pub session_redis_prefix: String,

    /// Time-to-live (TTL) in seconds for Redis session entries. 0 means no TTL.
    #[arg(long, env = "SESSION_TTL_SECONDS", default_value = "0")]
    pub session_ttl_seconds: u64,

    // --- Content Args ---
    /// Optional JSON file replacing the built-in awareness catalogue.
    #[arg(long, env = "AWARENESS_PATH")]
    pub awareness_path: Option<String>,
}

impl Args {
    pub fn origins(&self) -> Vec<String> {
        split_list(&self.allowed_origins)
    }

    pub fn hosts(&self) -> Vec<String> {
        split_list(&self.allowed_hosts)
    }

    pub fn twilio_configured(&self) -> bool {
        !self.twilio_account_sid.is_empty()
            && !self.twilio_auth_token.is_empty()
            && !self.twilio_phone_number.is_empty()
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_flags_are_split_and_trimmed() {
        let args = Args::parse_from([
            "safechild-backend",
            "--allowed-origins",
            "http://a.test, http://b.test ,",
            "--allowed-hosts",
            "*",
        ]);
        assert_eq!(args.origins(), vec!["http://a.test", "http://b.test"]);
        assert_eq!(args.hosts(), vec!["*"]);
    }

    #[test]
    fn twilio_requires_all_three_settings() {
        let mut args = Args::parse_from(["safechild-backend"]);
        args.twilio_account_sid = "AC123".into();
        args.twilio_auth_token = "token".into();
        args.twilio_phone_number = String::new();
        assert!(!args.twilio_configured());
        args.twilio_phone_number = "+15550000000".into();
        assert!(args.twilio_configured());
    }
}

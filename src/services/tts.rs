use async_trait::async_trait;
use chrono::Utc;
use log::{ error, info, warn };
use reqwest::Client as HttpClient;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::sync::atomic::{ AtomicU64, Ordering };
use std::sync::Arc;
use std::time::Duration;

use crate::cache::AudioCache;
use crate::cli::Args;
use crate::text::TextCleaner;

const CHUNK_CHARS: usize = 100;
const SYNTH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BATCH: usize = 10;
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

const LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("zh", "Chinese"),
];

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        slow: bool
    ) -> Result<Vec<u8>, Box<dyn StdError + Send + Sync>>;

    fn name(&self) -> &'static str;
}

/// Speech through the public Google Translate TTS endpoint. Long text is sent
/// in chunks and the MP3 frames are concatenated.
pub struct GoogleTranslateSynthesizer {
    http: HttpClient,
    base_url: String,
}

impl GoogleTranslateSynthesizer {
    pub fn new(base_url: &str) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let http = HttpClient::builder().user_agent(USER_AGENT).timeout(SYNTH_TIMEOUT).build()?;
        Ok(Self { http, base_url: base_url.to_string() })
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTranslateSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        slow: bool
    ) -> Result<Vec<u8>, Box<dyn StdError + Send + Sync>> {
        let chunks = split_into_chunks(text, CHUNK_CHARS);
        let total = chunks.len().to_string();
        let speed = if slow { "0.3" } else { "1" };
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let bytes = self.http
                .get(&self.base_url)
                .query(
                    &[
                        ("ie", "UTF-8"),
                        ("q", chunk.as_str()),
                        ("tl", language),
                        ("client", "tw-ob"),
                        ("ttsspeed", speed),
                        ("total", total.as_str()),
                        ("idx", idx.as_str()),
                        ("textlen", textlen.as_str()),
                    ]
                )
                .send().await?
                .error_for_status()?
                .bytes().await?;
            audio.extend_from_slice(&bytes);
        }

        if audio.is_empty() {
            return Err("speech endpoint returned no audio".into());
        }
        Ok(audio)
    }

    fn name(&self) -> &'static str {
        "google_translate"
    }
}

/// Splits on whitespace into pieces of at most `max_chars` characters.
/// Words longer than the limit are cut.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.push(word.drain(..max_chars).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[derive(Debug, Clone)]
pub struct TtsSettings {
    pub default_language: String,
    pub default_slow: bool,
    pub audio_format: String,
}

impl TtsSettings {
    pub fn from_args(args: &Args) -> Self {
        Self {
            default_language: args.tts_default_language.clone(),
            default_slow: args.tts_default_slow,
            audio_format: args.tts_audio_format.clone(),
        }
    }
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            default_slow: false,
            audio_format: "mp3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TtsResult {
    pub success: bool,
    #[serde(skip)]
    pub audio: Option<Vec<u8>>,
    pub cached: bool,
    pub language: String,
    pub slow: bool,
    pub format: String,
    pub text_length: usize,
    pub audio_size: usize,
    pub estimated_duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_languages: Option<Vec<String>>,
    pub timestamp: String,
}

impl TtsResult {
    fn failure(language: &str, slow: bool, format: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            audio: None,
            cached: false,
            language: language.to_string(),
            slow,
            format: format.to_string(),
            text_length: 0,
            audio_size: 0,
            estimated_duration_seconds: 0.0,
            error: Some(error.into()),
            supported_languages: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn is_unsupported_language(&self) -> bool {
        self.supported_languages.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SafetyTtsResult {
    #[serde(flatten)]
    pub result: TtsResult,
    pub urgency_level: String,
    pub target_age: String,
    pub message_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchTtsResult {
    pub success: bool,
    pub total_texts: usize,
    pub successful_conversions: usize,
    pub failed_conversions: usize,
    pub results: Vec<TtsResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LanguageList {
    pub success: bool,
    pub languages: BTreeMap<String, String>,
    pub default_language: String,
    pub total_languages: usize,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TtsHealth {
    pub status: String,
    pub service: String,
    pub provider: String,
    pub default_language: String,
    pub supported_languages_count: usize,
    pub cache_directory: String,
    pub cache_size_mb: f64,
    pub test_conversion: bool,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TtsUsageStats {
    pub default_language: String,
    pub supported_languages_count: usize,
    pub cache_directory: String,
    pub max_cache_size_mb: f64,
    pub cache_ttl_hours: u64,
    pub audio_format: String,
    pub default_slow: bool,
    pub conversions: u64,
    pub cache_hits: u64,
}

/// Rough MP3 estimate: one megabyte is about a minute of speech.
pub fn estimate_duration_seconds(audio_size: usize) -> f64 {
    let minutes = (audio_size as f64) / (1024.0 * 1024.0);
    (minutes * 60.0 * 10.0).round() / 10.0
}

fn to_mb(bytes: u64) -> f64 {
    ((bytes as f64) / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

/// Cache lifetime from a CLI hour count; huge values saturate.
fn cache_ttl(hours: u64) -> Duration {
    Duration::from_secs(hours.saturating_mul(3600))
}

fn cache_budget_bytes(megabytes: u64) -> u64 {
    megabytes.saturating_mul(1024 * 1024)
}

pub struct TtsService {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    cache: AudioCache,
    cleaner: TextCleaner,
    settings: TtsSettings,
    conversions: AtomicU64,
    cache_hits: AtomicU64,
}

impl TtsService {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, cache: AudioCache, settings: TtsSettings) -> Self {
        info!("TTS service initialized with language: {}", settings.default_language);
        Self {
            synthesizer,
            cache,
            cleaner: TextCleaner::new(),
            settings,
            conversions: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    pub async fn from_args(args: &Args) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let cache = AudioCache::new(
            &args.tts_cache_dir,
            cache_ttl(args.tts_cache_ttl_hours),
            cache_budget_bytes(args.tts_max_cache_size_mb)
        ).await?;
        let synthesizer = Arc::new(GoogleTranslateSynthesizer::new(&args.tts_base_url)?);
        Ok(Self::new(synthesizer, cache, TtsSettings::from_args(args)))
    }

    pub fn is_supported(&self, language: &str) -> bool {
        LANGUAGES.iter().any(|(code, _)| *code == language)
    }

    pub async fn convert(
        &self,
        text: &str,
        language: Option<&str>,
        slow: Option<bool>,
        format: Option<&str>
    ) -> TtsResult {
        let language = language.filter(|l| !l.is_empty()).unwrap_or(&self.settings.default_language);
        let slow = slow.unwrap_or(self.settings.default_slow);
        let format = format.filter(|f| !f.is_empty()).unwrap_or(&self.settings.audio_format);

        let cleaned = self.cleaner.clean_outbound(text);
        if cleaned.is_empty() {
            return TtsResult::failure(language, slow, format, "Invalid or empty text input");
        }

        if !self.is_supported(language) {
            let mut result = TtsResult::failure(
                language,
                slow,
                format,
                format!("Unsupported language: {}", language)
            );
            result.supported_languages = Some(
                LANGUAGES.iter()
                    .map(|(code, _)| code.to_string())
                    .collect()
            );
            return result;
        }

        let key = AudioCache::key(&cleaned, language, slow, format);
        match self.cache.get(&key, format).await {
            Ok(Some(audio)) => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                return self.success(audio, true, &cleaned, language, slow, format);
            }
            Ok(None) => {}
            Err(e) => warn!("Error reading audio cache: {}", e),
        }

        let audio = match self.synthesizer.synthesize(&cleaned, language, slow).await {
            Ok(audio) if !audio.is_empty() => audio,
            Ok(_) => {
                return TtsResult::failure(language, slow, format, "Failed to generate speech audio");
            }
            Err(e) => {
                error!("Error generating speech with {}: {}", self.synthesizer.name(), e);
                return TtsResult::failure(language, slow, format, "Failed to generate speech audio");
            }
        };
        self.conversions.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = self.cache.put(&key, format, &audio).await {
            warn!("Error caching audio: {}", e);
        }

        self.success(audio, false, &cleaned, language, slow, format)
    }

    fn success(
        &self,
        audio: Vec<u8>,
        cached: bool,
        text: &str,
        language: &str,
        slow: bool,
        format: &str
    ) -> TtsResult {
        TtsResult {
            success: true,
            cached,
            language: language.to_string(),
            slow,
            format: format.to_string(),
            text_length: text.chars().count(),
            audio_size: audio.len(),
            estimated_duration_seconds: estimate_duration_seconds(audio.len()),
            error: None,
            supported_languages: None,
            timestamp: Utc::now().to_rfc3339(),
            audio: Some(audio),
        }
    }

    /// Urgent messages and young listeners get slow speech.
    pub async fn convert_safety_message(&self, message: &str, urgency_level: &str, target_age: &str) -> SafetyTtsResult {
        let slow = urgency_level == "high" || matches!(target_age, "child" | "toddler");
        let language = self.settings.default_language.clone();
        let result = self.convert(message, Some(&language), Some(slow), None).await;
        SafetyTtsResult {
            result,
            urgency_level: urgency_level.to_string(),
            target_age: target_age.to_string(),
            message_type: "safety".to_string(),
        }
    }

    pub async fn batch_convert(&self, texts: &[String], language: Option<&str>, slow: Option<bool>) -> BatchTtsResult {
        if texts.is_empty() || texts.len() > MAX_BATCH {
            return BatchTtsResult {
                success: false,
                total_texts: texts.len(),
                successful_conversions: 0,
                failed_conversions: texts.len(),
                results: Vec::new(),
                error: Some("Invalid batch size. Must be between 1 and 10 texts.".to_string()),
                timestamp: Utc::now().to_rfc3339(),
            };
        }

        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.convert(text, language, slow, None).await);
        }
        let ok = results
            .iter()
            .filter(|r| r.success)
            .count();

        BatchTtsResult {
            success: ok > 0,
            total_texts: texts.len(),
            successful_conversions: ok,
            failed_conversions: texts.len() - ok,
            results,
            error: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn languages(&self) -> LanguageList {
        let languages: BTreeMap<String, String> = LANGUAGES.iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect();
        LanguageList {
            success: true,
            total_languages: languages.len(),
            languages,
            default_language: self.settings.default_language.clone(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub async fn health(&self) -> TtsHealth {
        let probe = self.convert("Hello", Some("en"), Some(false), None).await;
        let cache_size = self.cache.size().await.unwrap_or(0);
        TtsHealth {
            status: (if probe.success { "healthy" } else { "unhealthy" }).to_string(),
            service: "TTS".to_string(),
            provider: self.synthesizer.name().to_string(),
            default_language: self.settings.default_language.clone(),
            supported_languages_count: LANGUAGES.len(),
            cache_directory: self.cache.dir().display().to_string(),
            cache_size_mb: to_mb(cache_size),
            test_conversion: probe.success,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn usage_stats(&self) -> TtsUsageStats {
        TtsUsageStats {
            default_language: self.settings.default_language.clone(),
            supported_languages_count: LANGUAGES.len(),
            cache_directory: self.cache.dir().display().to_string(),
            max_cache_size_mb: to_mb(self.cache.max_bytes()),
            cache_ttl_hours: self.cache.ttl().as_secs() / 3600,
            audio_format: self.settings.audio_format.clone(),
            default_slow: self.settings.default_slow,
            conversions: self.conversions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }
}

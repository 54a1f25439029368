#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{ header, Request, Response, StatusCode };
use axum::Router;
use clap::Parser;
use http_body_util::BodyExt;
use serde_json::Value;
use std::error::Error;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use safechild_backend::cache::AudioCache;
use safechild_backend::cli::Args;
use safechild_backend::llm::chat::{ ChatClient, ChatCompletion, ChatMessage, ChatOptions, ProviderHealth };
use safechild_backend::llm::manager::AiManager;
use safechild_backend::llm::LlmType;
use safechild_backend::server::{ router, AppState, Components };
use safechild_backend::services::awareness::load_catalogue;
use safechild_backend::services::sms::{ GatewayReceipt, SmsGateway, SmsService, SmsSettings };
use safechild_backend::services::tts::{ SpeechSynthesizer, TtsService, TtsSettings };
use safechild_backend::session::MemorySessionStore;

/// Replies with the last message, or fails every call when `up` is false.
pub struct FakeChat {
    pub up: bool,
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        _options: &ChatOptions
    ) -> Result<ChatCompletion, Box<dyn Error + Send + Sync>> {
        if !self.up {
            return Err("provider offline".into());
        }
        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        Ok(ChatCompletion { content: format!("reply to: {}", last), model: "fake-1".into(), total_tokens: Some(7) })
    }

    async fn health(&self) -> ProviderHealth {
        ProviderHealth {
            status: (if self.up { "healthy" } else { "unhealthy" }).into(),
            model: Some("fake-1".into()),
            error: None,
        }
    }

    fn get_model(&self) -> String {
        "fake-1".into()
    }

    fn get_base_url(&self) -> Option<String> {
        Some("http://fake.local".into())
    }

    fn llm_type(&self) -> LlmType {
        LlmType::Aiml
    }

    fn has_api_key(&self) -> bool {
        false
    }
}

#[derive(Default)]
pub struct FakeGateway {
    pub sent: AtomicUsize,
}

#[async_trait]
impl SmsGateway for FakeGateway {
    async fn send(&self, _to: &str, _body: &str) -> Result<GatewayReceipt, Box<dyn Error + Send + Sync>> {
        let n = self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(GatewayReceipt { message_sid: format!("SM{}", n), status: "queued".into() })
    }

    async fn health(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Returns the text bytes as "audio" and counts calls.
#[derive(Default)]
pub struct FakeSpeech {
    pub calls: AtomicUsize,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(
        &self,
        text: &str,
        _language: &str,
        _slow: bool
    ) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(text.as_bytes().to_vec())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    pub speech: Arc<FakeSpeech>,
    _cache_dir: TempDir,
}

pub fn default_args() -> Args {
    Args::parse_from(["safechild-backend"])
}

pub async fn app() -> TestApp {
    app_with(default_args(), true).await
}

pub async fn app_with(args: Args, provider_up: bool) -> TestApp {
    let cache_dir = TempDir::new().unwrap();
    let cache = AudioCache::new(cache_dir.path(), Duration::from_secs(3600), 10 * 1024 * 1024).await.unwrap();
    let gateway = Arc::new(FakeGateway::default());
    let speech = Arc::new(FakeSpeech::default());

    let components = Components {
        ai: Arc::new(AiManager::with_client(Arc::new(FakeChat { up: provider_up }))),
        sms: Arc::new(SmsService::new(Some(gateway.clone() as Arc<dyn SmsGateway>), SmsSettings::default())),
        tts: Arc::new(TtsService::new(speech.clone(), cache, TtsSettings::default())),
        sessions: Arc::new(MemorySessionStore::new()),
        catalogue: load_catalogue(None).unwrap(),
    };
    let state = AppState::new(args, components);
    TestApp { router: router(state.clone()), state, gateway, speech, _cache_dir: cache_dir }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let response = self.send(request("GET", uri, None)).await;
        split(response).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        split(self.send(request("DELETE", uri, None)).await).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        split(self.send(request("POST", uri, Some(body))).await).await
    }

    pub async fn post_empty(&self, uri: &str) -> (StatusCode, Value) {
        split(self.send(request("POST", uri, None)).await).await
    }

    pub async fn put(&self, uri: &str) -> (StatusCode, Value) {
        split(self.send(request("PUT", uri, None)).await).await
    }
}

pub fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri).header(header::HOST, "localhost");
    match body {
        Some(json) =>
            builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn split(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let body = bytes(response).await;
    let json = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap_or(Value::Null) };
    (status, json)
}

pub mod awareness;
pub mod chat;
pub mod complaint;
pub mod document;
pub mod emergency;
pub mod gpt;
pub mod rate_limit;
pub mod sms;
pub mod tts;

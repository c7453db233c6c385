//! Ollama: local `/api/chat`, non-streaming, no key.

use companion_core::ProviderError;
use serde_json::{Value, json};

use super::prompt::Prompt;

pub const DEFAULT_MODEL: &str = "llama3";

pub fn endpoint(base_url: &str) -> String {
    format!("{}/api/chat", base_url.trim_end_matches('/'))
}

pub fn request_body(model: &str, prompt: &Prompt, temperature: f32) -> Value {
    json!({
        "model": model,
        "messages": prompt.chat_messages(),
        "stream": false,
        "options": { "temperature": temperature },
    })
}

pub fn parse_reply(body: &Value) -> Result<String, ProviderError> {
    body.pointer("/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Malformed("missing message.content".into()))
}

pub fn error_message(body: &Value) -> Option<String> {
    body.get("error").and_then(Value::as_str).map(str::to_string)
}

//! Groq: OpenAI-compatible chat completions.

use companion_core::ProviderError;
use serde_json::{Value, json};

use super::prompt::Prompt;

pub const ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama3-70b-8192";

pub fn request_body(model: &str, prompt: &Prompt, temperature: f32, max_tokens: u32) -> Value {
    json!({
        "model": model,
        "messages": prompt.chat_messages(),
        "temperature": temperature,
        "max_tokens": max_tokens,
    })
}

pub fn parse_reply(body: &Value) -> Result<String, ProviderError> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Malformed("missing choices[0].message.content".into()))
}

pub fn error_message(body: &Value) -> Option<String> {
    body.pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

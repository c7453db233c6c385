//! Google Gemini `generateContent`.
//!
//! Gemini has no system role here, so the system prompt goes first as a
//! user turn followed by a short model acknowledgement.

use companion_core::ProviderError;
use reqwest::Url;
use serde_json::{Value, json};

use super::prompt::{Prompt, Role};

pub const BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const ACKNOWLEDGEMENT: &str = "Understood. I'll follow these guidelines.";

/// 1.5-series models are only served from `v1beta`.
pub fn api_version(model: &str) -> &'static str {
    if model.contains("1.5") { "v1beta" } else { "v1" }
}

pub fn endpoint(base_url: &str, model: &str, api_key: &str) -> Result<Url, ProviderError> {
    let raw = format!(
        "{}/{}/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        api_version(model),
        model
    );
    let mut url = Url::parse(&raw)
        .map_err(|e| ProviderError::NotConfigured(format!("invalid Gemini URL {raw}: {e}")))?;
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

fn content(role: &str, text: &str) -> Value {
    json!({ "role": role, "parts": [{ "text": text }] })
}

pub fn request_body(prompt: &Prompt, temperature: f32, max_tokens: u32) -> Value {
    let mut contents = vec![
        content("user", &prompt.system),
        content("model", ACKNOWLEDGEMENT),
    ];
    contents.extend(prompt.messages.iter().map(|m| {
        let role = match m.role {
            Role::User => "user",
            Role::Assistant => "model",
        };
        content(role, &m.content)
    }));

    json!({
        "contents": contents,
        "generationConfig": {
            "temperature": temperature,
            "maxOutputTokens": max_tokens,
        },
    })
}

pub fn parse_reply(body: &Value) -> Result<String, ProviderError> {
    body.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ProviderError::Malformed("missing candidates[0].content.parts[0].text".into())
        })
}

pub fn error_message(body: &Value) -> Option<String> {
    body.pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

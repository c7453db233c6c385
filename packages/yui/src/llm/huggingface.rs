//! Hugging Face text-generation inference with `[INST]` formatting.

use companion_core::ProviderError;
use serde_json::{Value, json};

use super::prompt::{Prompt, Role};

pub const BASE_URL: &str = "https://api-inference.huggingface.co/models";
pub const DEFAULT_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.2";

const MAX_NEW_TOKENS: u32 = 1024;

pub fn endpoint(base_url: &str, model: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), model)
}

/// Flatten the conversation into a single instruct-style prompt.
pub fn format_inputs(prompt: &Prompt) -> String {
    let mut inputs = format!("<s>[INST] {}\n\n", prompt.system);
    for message in &prompt.messages {
        match message.role {
            Role::User => {
                inputs.push_str(&message.content);
                inputs.push_str(" [/INST]");
            }
            Role::Assistant => {
                inputs.push(' ');
                inputs.push_str(&message.content);
                inputs.push_str(" </s><s>[INST] ");
            }
        }
    }
    inputs
}

pub fn request_body(prompt: &Prompt, temperature: f32, max_tokens: u32) -> Value {
    json!({
        "inputs": format_inputs(prompt),
        "parameters": {
            "max_new_tokens": max_tokens.min(MAX_NEW_TOKENS),
            "temperature": temperature,
            "return_full_text": false,
        },
    })
}

/// The API answers with either a list of generations or a single object.
pub fn parse_reply(body: &Value) -> Result<String, ProviderError> {
    let generation = match body {
        Value::Array(items) => items.first(),
        other => Some(other),
    };
    generation
        .and_then(|g| g.get("generated_text"))
        .and_then(Value::as_str)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| ProviderError::Malformed("missing generated_text".into()))
}

pub fn error_message(body: &Value) -> Option<String> {
    body.get("error").and_then(Value::as_str).map(str::to_string)
}

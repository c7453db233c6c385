//! Cohere `/v1/chat`: the current message is sent apart from the history.

use companion_core::ProviderError;
use serde_json::{Value, json};

use super::prompt::{Prompt, Role};

pub const ENDPOINT: &str = "https://api.cohere.ai/v1/chat";
pub const DEFAULT_MODEL: &str = "command";

pub fn request_body(model: &str, prompt: &Prompt, temperature: f32) -> Value {
    let earlier = &prompt.messages[..prompt.messages.len().saturating_sub(1)];
    let chat_history: Vec<Value> = earlier
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "USER",
                Role::Assistant => "CHATBOT",
            };
            json!({ "role": role, "message": m.content })
        })
        .collect();

    json!({
        "model": model,
        "message": prompt.current(),
        "chat_history": chat_history,
        "preamble": prompt.system,
        "temperature": temperature,
    })
}

pub fn parse_reply(body: &Value) -> Result<String, ProviderError> {
    body.get("text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Malformed("missing text".into()))
}

pub fn error_message(body: &Value) -> Option<String> {
    body.get("message").and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::prompt::PromptMessage;

    #[test]
    fn splits_current_message_from_history() {
        let prompt = Prompt {
            system: "preamble text".into(),
            messages: vec![
                PromptMessage { role: Role::User, content: "q1".into() },
                PromptMessage { role: Role::Assistant, content: "a1".into() },
                PromptMessage { role: Role::User, content: "q2".into() },
            ],
        };
        let body = request_body("command", &prompt, 0.7);
        assert_eq!(body["message"], "q2");
        assert_eq!(body["preamble"], "preamble text");
        assert_eq!(body["chat_history"][0]["role"], "USER");
        assert_eq!(body["chat_history"][1]["role"], "CHATBOT");
        assert_eq!(body["chat_history"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn parses_text() {
        assert_eq!(parse_reply(&json!({"text": "hello"})).unwrap(), "hello");
        assert!(parse_reply(&json!({})).is_err());
        assert_eq!(error_message(&json!({"message": "invalid api token"})).as_deref(), Some("invalid api token"));
    }
}

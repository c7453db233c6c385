//! LLM providers behind [`companion_core::LlmProvider`].
//!
//! Each provider module holds the pure request/response mapping; this module
//! owns provider selection and the shared HTTP plumbing.

use async_trait::async_trait;
use companion_core::{ConversationContext, LlmProvider, Personality, ProviderError};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::LlmFileConfig;

mod cohere;
mod gemini;
mod groq;
mod huggingface;
mod ollama;
pub mod prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Groq,
    Gemini,
    HuggingFace,
    Ollama,
    Cohere,
}

/// Providers tried, in order, when the preferred one has no key.
pub const AUTO_DETECT_ORDER: [ProviderKind; 4] = [
    ProviderKind::Groq,
    ProviderKind::Gemini,
    ProviderKind::HuggingFace,
    ProviderKind::Cohere,
];

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "groq",
            ProviderKind::Gemini => "gemini",
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Cohere => "cohere",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Groq => groq::DEFAULT_MODEL,
            ProviderKind::Gemini => gemini::DEFAULT_MODEL,
            ProviderKind::HuggingFace => huggingface::DEFAULT_MODEL,
            ProviderKind::Ollama => ollama::DEFAULT_MODEL,
            ProviderKind::Cohere => cohere::DEFAULT_MODEL,
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Groq => groq::ENDPOINT,
            ProviderKind::Gemini => gemini::BASE_URL,
            ProviderKind::HuggingFace => huggingface::BASE_URL,
            ProviderKind::Cohere => cohere::ENDPOINT,
            // Comes from `llm.ollama_url`.
            ProviderKind::Ollama => "http://localhost:11434",
        }
    }

    fn needs_key(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Honor `llm.provider` when usable, otherwise take the first provider with a key.
pub fn select_provider(llm: &LlmFileConfig) -> Result<ProviderKind, ProviderError> {
    if let Some(preferred) = llm.provider {
        if !preferred.needs_key() || llm.api_key(preferred).is_some() {
            return Ok(preferred);
        }
        warn!(provider = %preferred, "configured provider has no API key, auto-detecting");
    }

    AUTO_DETECT_ORDER
        .into_iter()
        .find(|kind| llm.api_key(*kind).is_some())
        .ok_or_else(|| {
            ProviderError::NotConfigured(
                "no LLM provider available. Set one of GROQ_API_KEY, GEMINI_API_KEY, \
                 HUGGINGFACE_API_KEY, COHERE_API_KEY, or YUI_LLM__PROVIDER=ollama"
                    .to_string(),
            )
        })
}

/// Everything needed to talk to one provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: Option<String>,
    /// Endpoint for groq/cohere; base URL for the others.
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub history_turns: usize,
}

impl ProviderSettings {
    pub fn resolve(llm: &LlmFileConfig, history_turns: usize) -> Result<Self, ProviderError> {
        let kind = select_provider(llm)?;
        let base_url = match kind {
            ProviderKind::Ollama => llm.ollama_url.clone(),
            other => other.default_base_url().to_string(),
        };
        let model = llm
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| kind.default_model().to_string());

        Ok(Self {
            kind,
            model,
            api_key: llm.api_key(kind).map(str::to_string),
            base_url,
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            timeout: Duration::from_secs(llm.timeout_secs),
            history_turns,
        })
    }
}

pub struct HttpProvider {
    settings: ProviderSettings,
    client: Client,
}

impl HttpProvider {
    pub fn new(settings: ProviderSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(settings.timeout)
            .build()?;

        info!(provider = %settings.kind, model = %settings.model, "LLM provider ready");

        Ok(Self { settings, client })
    }

    fn key(&self) -> Result<&str, ProviderError> {
        self.settings.api_key.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured(format!("{} API key", self.settings.kind))
        })
    }

    fn endpoint(&self) -> Result<Url, ProviderError> {
        let s = &self.settings;
        let raw = match s.kind {
            ProviderKind::Gemini => return gemini::endpoint(&s.base_url, &s.model, self.key()?),
            ProviderKind::HuggingFace => huggingface::endpoint(&s.base_url, &s.model),
            ProviderKind::Ollama => ollama::endpoint(&s.base_url),
            ProviderKind::Groq | ProviderKind::Cohere => s.base_url.clone(),
        };
        Url::parse(&raw)
            .map_err(|e| ProviderError::NotConfigured(format!("invalid endpoint {raw}: {e}")))
    }

    fn request_body(&self, prompt: &prompt::Prompt) -> Value {
        let s = &self.settings;
        match s.kind {
            ProviderKind::Groq => groq::request_body(&s.model, prompt, s.temperature, s.max_tokens),
            ProviderKind::Gemini => gemini::request_body(prompt, s.temperature, s.max_tokens),
            ProviderKind::HuggingFace => {
                huggingface::request_body(prompt, s.temperature, s.max_tokens)
            }
            ProviderKind::Ollama => ollama::request_body(&s.model, prompt, s.temperature),
            ProviderKind::Cohere => cohere::request_body(&s.model, prompt, s.temperature),
        }
    }

    fn parse_reply(&self, body: &Value) -> Result<String, ProviderError> {
        match self.settings.kind {
            ProviderKind::Groq => groq::parse_reply(body),
            ProviderKind::Gemini => gemini::parse_reply(body),
            ProviderKind::HuggingFace => huggingface::parse_reply(body),
            ProviderKind::Ollama => ollama::parse_reply(body),
            ProviderKind::Cohere => cohere::parse_reply(body),
        }
    }

    fn error_message(&self, body: &Value) -> Option<String> {
        match self.settings.kind {
            ProviderKind::Groq => groq::error_message(body),
            ProviderKind::Gemini => gemini::error_message(body),
            ProviderKind::HuggingFace => huggingface::error_message(body),
            ProviderKind::Ollama => ollama::error_message(body),
            ProviderKind::Cohere => cohere::error_message(body),
        }
    }

    fn map_send_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.settings.timeout)
        } else if err.is_connect() && self.settings.kind == ProviderKind::Ollama {
            ProviderError::Network(
                "cannot connect to Ollama. Make sure it is running (ollama serve)".to_string(),
            )
        } else {
            ProviderError::Network(err.to_string())
        }
    }

    async fn post(&self, url: Url, body: &Value) -> Result<Value, ProviderError> {
        let mut request = self.client.post(url).json(body);
        if matches!(
            self.settings.kind,
            ProviderKind::Groq | ProviderKind::HuggingFace | ProviderKind::Cohere
        ) {
            request = request.bearer_auth(self.key()?);
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        let parsed = serde_json::from_str::<Value>(&text);

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|v| self.error_message(&v))
                .unwrap_or_else(|| text.chars().take(200).collect());
            return Err(http_error(status.as_u16(), message));
        }

        parsed.map_err(|e| {
            let preview: String = text.chars().take(200).collect();
            ProviderError::Malformed(format!("{e}: {preview}"))
        })
    }
}

/// 429 is a quota problem; everything else keeps its status.
pub fn http_error(status: u16, message: String) -> ProviderError {
    if status == 429 {
        ProviderError::Quota(message)
    } else {
        ProviderError::Http { status, message }
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    fn name(&self) -> &str {
        self.settings.kind.as_str()
    }

    async fn complete(
        &self,
        context: &ConversationContext,
        personality: Personality,
    ) -> Result<String, ProviderError> {
        let prompt = prompt::build_prompt(
            context,
            personality,
            self.settings.history_turns,
            chrono::Local::now().naive_local(),
        );
        let url = self.endpoint()?;
        let body = self.request_body(&prompt);

        debug!(
            provider = %self.settings.kind,
            messages = prompt.messages.len(),
            "sending completion request"
        );
        let response = self.post(url, &body).await?;
        self.parse_reply(&response)
    }
}

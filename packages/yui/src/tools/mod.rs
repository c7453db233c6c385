//! Free helper APIs (weather, jokes, quotes, ...) behind [`ToolProvider`].

use async_trait::async_trait;
use companion_core::{ProviderError, ToolProvider, ToolRequest};
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::llm::http_error;

pub mod format;
pub mod intent;

/// Search results shown per query.
const MAX_SEARCH_RESULTS: usize = 3;

/// Base URLs for each helper API.
#[derive(Debug, Clone)]
pub struct ToolEndpoints {
    pub weather: String,
    pub jokes: String,
    pub quotes: String,
    pub facts: String,
    pub advice: String,
    pub activities: String,
    pub crypto: String,
    pub dictionary: String,
    pub search: String,
}

impl Default for ToolEndpoints {
    fn default() -> Self {
        Self {
            weather: "https://wttr.in".into(),
            jokes: "https://v2.jokeapi.dev/joke".into(),
            quotes: "https://zenquotes.io/api".into(),
            facts: "https://uselessfacts.jsph.pl/api/v2/facts".into(),
            advice: "https://api.adviceslip.com".into(),
            activities: "https://www.boredapi.com/api".into(),
            crypto: "https://api.coingecko.com/api/v3".into(),
            dictionary: "https://api.dictionaryapi.dev/api/v2/entries/en".into(),
            search: "https://api.duckduckgo.com".into(),
        }
    }
}

#[cfg(test)]
impl ToolEndpoints {
    /// Every API under one base; used to point the tools at a local server.
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            weather: base.clone(),
            jokes: base.clone(),
            quotes: base.clone(),
            facts: base.clone(),
            advice: base.clone(),
            activities: base.clone(),
            crypto: base.clone(),
            dictionary: base.clone(),
            search: base,
        }
    }
}

/// `base` + path segments (percent-encoded) + query pairs.
fn build_url(base: &str, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, ProviderError> {
    let mut url = Url::parse(base)
        .map_err(|e| ProviderError::NotConfigured(format!("invalid tool URL {base}: {e}")))?;
    if !segments.is_empty() {
        url.path_segments_mut()
            .map_err(|_| ProviderError::NotConfigured(format!("tool URL cannot have a path: {base}")))?
            .pop_if_empty()
            .extend(segments);
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

pub struct HelperTools {
    client: Client,
    endpoints: ToolEndpoints,
    timeout: Duration,
}

impl HelperTools {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        Self::with_endpoints(ToolEndpoints::default(), timeout)
    }

    pub fn with_endpoints(endpoints: ToolEndpoints, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("yui/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoints,
            timeout,
        })
    }

    async fn get_json(&self, url: Url) -> Result<Value, ProviderError> {
        debug!(%url, "calling helper API");
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout)
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(status.as_u16(), body.chars().take(200).collect()));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    fn argument<'a>(request: &'a ToolRequest, fallback: &'a str) -> &'a str {
        request
            .argument
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(fallback)
    }
}

#[async_trait]
impl ToolProvider for HelperTools {
    fn detect(&self, message: &str) -> Option<ToolRequest> {
        intent::detect(message)
    }

    async fn invoke(&self, request: &ToolRequest) -> Result<String, ProviderError> {
        let ep = &self.endpoints;
        match request.name.as_str() {
            intent::WEATHER => {
                let location = Self::argument(request, "auto");
                let url = build_url(&ep.weather, &[location], &[("format", "j1")])?;
                format::weather(&self.get_json(url).await?)
            }
            intent::JOKE => {
                let mut url = build_url(&ep.jokes, &["Any"], &[])?;
                url.set_query(Some("safe-mode"));
                format::joke(&self.get_json(url).await?)
            }
            intent::QUOTE => {
                let url = build_url(&ep.quotes, &["random"], &[])?;
                format::quote(&self.get_json(url).await?)
            }
            intent::FACT => {
                let url = build_url(&ep.facts, &["random"], &[])?;
                format::fact(&self.get_json(url).await?)
            }
            intent::ADVICE => {
                let url = build_url(&ep.advice, &["advice"], &[])?;
                format::advice(&self.get_json(url).await?)
            }
            intent::ACTIVITY => {
                let url = build_url(&ep.activities, &["activity"], &[])?;
                format::activity(&self.get_json(url).await?)
            }
            intent::CRYPTO => {
                let coin = Self::argument(request, "bitcoin");
                let url = build_url(
                    &ep.crypto,
                    &["simple", "price"],
                    &[
                        ("ids", coin),
                        ("vs_currencies", "usd,inr"),
                        ("include_24hr_change", "true"),
                    ],
                )?;
                format::crypto(coin, &self.get_json(url).await?)
            }
            intent::DEFINITION => {
                let word = Self::argument(request, "");
                if word.is_empty() {
                    return Err(ProviderError::Malformed("no word to define".into()));
                }
                let url = build_url(&ep.dictionary, &[word], &[])?;
                format::definition(&self.get_json(url).await?)
            }
            intent::SEARCH => {
                let query = Self::argument(request, "");
                if query.is_empty() {
                    return Err(ProviderError::Malformed("empty search query".into()));
                }
                let url = build_url(
                    &ep.search,
                    &[],
                    &[("q", query), ("format", "json"), ("no_html", "1")],
                )?;
                format::search(query, &self.get_json(url).await?, MAX_SEARCH_RESULTS)
            }
            other => Err(ProviderError::NotConfigured(format!("unknown tool '{other}'"))),
        }
    }
}

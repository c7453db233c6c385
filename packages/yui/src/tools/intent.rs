//! Natural-language intent detection for the helper tools.
//!
//! Patterns are checked in priority order against the lowercased message; the
//! first match wins. Search is the catch-all and comes last.

use std::sync::LazyLock;

use companion_core::ToolRequest;
use regex::Regex;

pub const WEATHER: &str = "weather";
pub const JOKE: &str = "joke";
pub const QUOTE: &str = "quote";
pub const FACT: &str = "fact";
pub const ADVICE: &str = "advice";
pub const ACTIVITY: &str = "activity";
pub const CRYPTO: &str = "crypto";
pub const DEFINITION: &str = "definition";
pub const SEARCH: &str = "search";

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("intent regex is valid")
}

static WEATHER_RE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(weather|temperature|forecast|hot|cold|sunny|rainy|climate)\s+(in|at|for)?\s+([a-zA-Z\s]+)")
});
static JOKE_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(tell|give|say)\s+(me\s+)?(a\s+)?(joke|funny)"));
static QUOTE_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(quote|inspiration|motivate|wisdom)"));
static FACT_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(fact|trivia|did you know|interesting)"));
static ADVICE_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(advice|tip|suggestion|recommend)"));
static ACTIVITY_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(bored|activity|something to do|what should i do)"));
static CRYPTO_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(bitcoin|ethereum|crypto|btc|eth)\s+(price)?"));
static DEFINITION_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(define|definition|meaning|what (is|does))\s+(.+)"));
static SEARCH_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(search|find|look up|google|tell me about|what is)\s+(.+)"));

/// Trimmed capture group, if it matched and is non-empty.
fn group(caps: &regex::Captures<'_>, index: usize) -> Option<String> {
    caps.get(index)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn detect(message: &str) -> Option<ToolRequest> {
    let lower = message.to_lowercase();

    if let Some(caps) = WEATHER_RE.captures(&lower) {
        let location = group(&caps, 3).unwrap_or_else(|| "auto".to_string());
        return Some(ToolRequest::new(WEATHER, Some(location)));
    }

    let simple = [
        (&*JOKE_RE, JOKE),
        (&*QUOTE_RE, QUOTE),
        (&*FACT_RE, FACT),
        (&*ADVICE_RE, ADVICE),
        (&*ACTIVITY_RE, ACTIVITY),
    ];
    if let Some((_, name)) = simple.iter().find(|(re, _)| re.is_match(&lower)) {
        return Some(ToolRequest::new(*name, None));
    }

    if CRYPTO_RE.is_match(&lower) {
        let coin = if lower.contains("ethereum") || lower.contains("eth") {
            "ethereum"
        } else {
            "bitcoin"
        };
        return Some(ToolRequest::new(CRYPTO, Some(coin.to_string())));
    }

    if let Some(word) = DEFINITION_RE.captures(&lower).and_then(|caps| group(&caps, 3)) {
        return Some(ToolRequest::new(DEFINITION, Some(word)));
    }

    SEARCH_RE.captures(&lower).map(|caps| {
        let query = group(&caps, 2).unwrap_or_else(|| message.trim().to_string());
        ToolRequest::new(SEARCH, Some(query))
    })
}

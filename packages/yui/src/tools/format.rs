//! Turn helper-API JSON into the text shown to the user.

use companion_core::ProviderError;
use serde_json::Value;

fn field<'a>(body: &'a Value, pointer: &str) -> Result<&'a Value, ProviderError> {
    body.pointer(pointer)
        .ok_or_else(|| ProviderError::Malformed(format!("missing {pointer}")))
}

fn text(body: &Value, pointer: &str) -> Result<String, ProviderError> {
    match field(body, pointer)? {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(ProviderError::Malformed(format!(
            "{pointer} is not text: {other}"
        ))),
    }
}

fn number(body: &Value, pointer: &str) -> Result<f64, ProviderError> {
    field(body, pointer)?
        .as_f64()
        .ok_or_else(|| ProviderError::Malformed(format!("{pointer} is not a number")))
}

/// `1234567.891` → `1,234,567.89`
fn thousands(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::new();
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// wttr.in `format=j1`.
pub fn weather(body: &Value) -> Result<String, ProviderError> {
    let current = field(body, "/current_condition/0")?;
    Ok(format!(
        "Weather for {}:\n\
         - Temperature: {}°C ({}°F)\n\
         - Conditions: {}\n\
         - Feels like: {}°C\n\
         - Humidity: {}%\n\
         - Wind: {} km/h",
        text(body, "/nearest_area/0/areaName/0/value")?,
        text(current, "/temp_C")?,
        text(current, "/temp_F")?,
        text(current, "/weatherDesc/0/value")?,
        text(current, "/FeelsLikeC")?,
        text(current, "/humidity")?,
        text(current, "/windspeedKmph")?,
    ))
}

/// JokeAPI: single-line or setup/delivery.
pub fn joke(body: &Value) -> Result<String, ProviderError> {
    if body.get("type").and_then(Value::as_str) == Some("single") {
        Ok(format!("😄 {}", text(body, "/joke")?))
    } else {
        Ok(format!(
            "😄 {}\n\n{}",
            text(body, "/setup")?,
            text(body, "/delivery")?
        ))
    }
}

/// ZenQuotes returns a one-element array.
pub fn quote(body: &Value) -> Result<String, ProviderError> {
    Ok(format!(
        "\"{}\"\n- {}",
        text(body, "/0/q")?,
        text(body, "/0/a")?
    ))
}

pub fn fact(body: &Value) -> Result<String, ProviderError> {
    Ok(format!("💡 {}", text(body, "/text")?))
}

pub fn advice(body: &Value) -> Result<String, ProviderError> {
    Ok(format!("💭 {}", text(body, "/slip/advice")?))
}

pub fn activity(body: &Value) -> Result<String, ProviderError> {
    Ok(format!(
        "🎯 {} ({})",
        text(body, "/activity")?,
        text(body, "/type")?
    ))
}

/// CoinGecko `simple/price` keyed by coin id.
pub fn crypto(coin: &str, body: &Value) -> Result<String, ProviderError> {
    let prices = body
        .get(coin)
        .ok_or_else(|| ProviderError::Malformed(format!("no price for {coin}")))?;
    let change = prices
        .get("usd_24h_change")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let trend = if change > 0.0 { "📈" } else { "📉" };

    Ok(format!(
        "💰 {} Price:\n- USD: ${}\n- INR: ₹{}\n- 24h Change: {trend} {change:.2}%",
        title_case(coin),
        thousands(number(prices, "/usd")?),
        thousands(number(prices, "/inr")?),
    ))
}

/// dictionaryapi.dev: first meaning of the first entry.
pub fn definition(body: &Value) -> Result<String, ProviderError> {
    let meaning = field(body, "/0/meanings/0")?;
    let example = meaning
        .pointer("/definitions/0/example")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .map(|e| format!("\nExample: {e}"))
        .unwrap_or_default();

    Ok(format!(
        "📖 {} ({}):\n{}{example}",
        text(body, "/0/word")?,
        text(meaning, "/partOfSpeech")?,
        text(meaning, "/definitions/0/definition")?,
    ))
}

/// DuckDuckGo instant answers: the abstract first, then related topics, at most `max` entries.
pub fn search(query: &str, body: &Value, max: usize) -> Result<String, ProviderError> {
    let mut results: Vec<(String, String, String)> = Vec::new();

    let abstract_text = body.get("AbstractText").and_then(Value::as_str).unwrap_or("");
    if !abstract_text.is_empty() {
        results.push((
            body.get("Heading").and_then(Value::as_str).unwrap_or(query).to_string(),
            abstract_text.to_string(),
            body.get("AbstractURL").and_then(Value::as_str).unwrap_or("").to_string(),
        ));
    }

    let topics = body
        .get("RelatedTopics")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for topic in topics {
        // Grouped topics nest their entries one level down.
        let entries = match topic.get("Topics").and_then(Value::as_array) {
            Some(nested) => nested.iter().collect::<Vec<_>>(),
            None => vec![topic],
        };
        for entry in entries {
            let Some(snippet) = entry.get("Text").and_then(Value::as_str) else {
                continue;
            };
            let title = snippet.split(" - ").next().unwrap_or(snippet);
            let url = entry.get("FirstURL").and_then(Value::as_str).unwrap_or("");
            results.push((title.to_string(), snippet.to_string(), url.to_string()));
        }
    }

    if results.is_empty() {
        return Err(ProviderError::Malformed(format!("no results for '{query}'")));
    }

    let mut out = format!("🔍 Search results for '{query}':\n\n");
    for (i, (title, snippet, url)) in results.into_iter().take(max).enumerate() {
        out.push_str(&format!("{}. **{title}**\n   {snippet}\n   {url}\n\n", i + 1));
    }
    Ok(out.trim_end().to_string())
}

use anyhow::{Context, Result};
use companion_core::{Personality, RouterConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::llm::ProviderKind;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [llm]
//                    provider = "gemini"
//
//   env var:         YUI_LLM__PROVIDER=gemini   (double underscore = nesting)
//
// Provider keys are also read from the bare GROQ_API_KEY, GEMINI_API_KEY,
// HUGGINGFACE_API_KEY and COHERE_API_KEY variables.

/// Raw environment variables mapped into the `[llm]` section.
const RAW_KEY_VARS: [&str; 4] = [
    "GROQ_API_KEY",
    "GEMINI_API_KEY",
    "HUGGINGFACE_API_KEY",
    "COHERE_API_KEY",
];

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Named configuration presets.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// host=127.0.0.1
    Local,
    /// host=0.0.0.0
    Server,
}

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub llm: LlmFileConfig,
    #[serde(default)]
    pub chat: ChatFileConfig,
    #[serde(default)]
    pub tools: ToolsFileConfig,
    #[serde(default)]
    pub client: ClientFileConfig,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// LLM provider selection and generation settings (`[llm]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmFileConfig {
    /// Preferred provider; falls back to auto-detection when its key is missing.
    #[serde(default)]
    pub provider: Option<ProviderKind>,
    /// Overrides the provider's default model.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default)]
    pub huggingface_api_key: Option<String>,
    #[serde(default)]
    pub cohere_api_key: Option<String>,
}

impl Default for LlmFileConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            ollama_url: default_ollama_url(),
            groq_api_key: None,
            gemini_api_key: None,
            huggingface_api_key: None,
            cohere_api_key: None,
        }
    }
}

impl LlmFileConfig {
    /// Configured key for `kind`, ignoring blank values.
    pub fn api_key(&self, kind: ProviderKind) -> Option<&str> {
        let key = match kind {
            ProviderKind::Groq => self.groq_api_key.as_deref(),
            ProviderKind::Gemini => self.gemini_api_key.as_deref(),
            ProviderKind::HuggingFace => self.huggingface_api_key.as_deref(),
            ProviderKind::Cohere => self.cohere_api_key.as_deref(),
            ProviderKind::Ollama => None,
        };
        key.map(str::trim).filter(|k| !k.is_empty())
    }
}

/// Conversation behaviour (`[chat]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatFileConfig {
    #[serde(default)]
    pub default_personality: Personality,
    /// Past turns sent to the LLM with each message.
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

impl Default for ChatFileConfig {
    fn default() -> Self {
        Self {
            default_personality: Personality::default(),
            max_history_turns: default_max_history_turns(),
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

/// Helper-API tools (`[tools]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsFileConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ToolsFileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_tool_timeout_secs(),
        }
    }
}

/// Terminal client settings (`[client]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientFileConfig {
    #[serde(default = "default_client_url")]
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

impl Default for ClientFileConfig {
    fn default() -> Self {
        Self {
            url: default_client_url(),
            name: None,
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_llm_timeout_secs() -> u64 {
    30
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_max_history_turns() -> usize {
    10
}
fn default_outbox_capacity() -> usize {
    companion_core::DEFAULT_OUTBOX_CAPACITY
}
fn default_true() -> bool {
    true
}
fn default_tool_timeout_secs() -> u64 {
    5
}
fn default_client_url() -> String {
    format!("http://{}:{}", DEFAULT_HOST, DEFAULT_PORT)
}
fn default_reconnect_delay_secs() -> u64 {
    3
}

impl FileConfig {
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            llm_timeout: Duration::from_secs(self.llm.timeout_secs),
            tool_timeout: Duration::from_secs(self.tools.timeout_secs),
        }
    }
}

/// Build a figment that layers: defaults → profile defaults → config.toml →
/// raw provider key vars → YUI_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `YUI_LLM__TIMEOUT_SECS=60`  →  `llm.timeout_secs = 60`
///   `YUI_CHAT__MAX_HISTORY_TURNS=4`  →  `chat.max_history_turns = 4`
pub fn load_config(data_dir: &Path, cli_profile: Option<&Profile>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let raw_keys = || {
        Env::raw()
            .only(&RAW_KEY_VARS)
            .map(|key| format!("llm.{}", key.as_str().to_ascii_lowercase()).into())
    };

    // Pass 1: peek at profile from config.toml/env (CLI overrides file)
    let base = Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("YUI_").split("__"));

    let profile: Option<Profile> = cli_profile
        .cloned()
        .or_else(|| base.extract_inner("profile").ok());

    // Pass 2: rebuild with profile defaults between struct defaults and config.toml
    let profile_layer = profile_to_file_config(profile.as_ref());

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Serialized::defaults(profile_layer))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(raw_keys())
        .merge(Env::prefixed("YUI_").split("__"))
}

fn profile_to_file_config(profile: Option<&Profile>) -> FileConfig {
    let host = match profile {
        Some(Profile::Local) => "127.0.0.1",
        Some(Profile::Server) => "0.0.0.0",
        None => return FileConfig::default(),
    };
    FileConfig {
        profile: profile.cloned(),
        server: ServerFileConfig {
            host: Some(host.to_string()),
            port: None,
        },
        ..Default::default()
    }
}

// =============================================================================
// Directory layout (derived from --data-dir, not tunable via figment)
// =============================================================================

#[derive(Clone, Debug)]
pub struct YuiConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
}

impl YuiConfig {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".yui"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let db_path = data_dir.join("yui_memory.db");

        info!("Data directory: {}", data_dir.display());

        Ok(Self {
            data_dir,
            db_path,
        })
    }

    pub fn db_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.db_path.display())
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    // ── profiles ────────────────────────────────────────────────────────

    #[test]
    fn test_local_profile() {
        let fc = profile_to_file_config(Some(&Profile::Local));
        assert_eq!(fc.profile, Some(Profile::Local));
        assert_eq!(fc.server.host.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_server_profile() {
        let fc = profile_to_file_config(Some(&Profile::Server));
        assert_eq!(fc.server.host.as_deref(), Some("0.0.0.0"));
        assert!(fc.server.port.is_none());
    }

    #[test]
    fn test_no_profile() {
        let fc = profile_to_file_config(None);
        assert!(fc.profile.is_none());
        assert!(fc.server.host.is_none());
    }

    // ── defaults ────────────────────────────────────────────────────────

    #[test]
    fn test_defaults() {
        let fc = FileConfig::default();
        assert!(fc.llm.provider.is_none());
        assert_eq!(fc.llm.timeout_secs, 30);
        assert_eq!(fc.llm.max_tokens, 2048);
        assert_eq!(fc.chat.default_personality, Personality::Yui);
        assert_eq!(fc.chat.max_history_turns, 10);
        assert!(fc.tools.enabled);
        assert_eq!(fc.tools.timeout_secs, 5);
        assert_eq!(fc.client.url, "http://127.0.0.1:8000");
        assert_eq!(fc.client.reconnect_delay_secs, 3);
    }

    #[test]
    fn test_router_config_from_file() {
        let mut fc = FileConfig::default();
        fc.llm.timeout_secs = 12;
        fc.tools.timeout_secs = 2;
        let rc = fc.router_config();
        assert_eq!(rc.llm_timeout, Duration::from_secs(12));
        assert_eq!(rc.tool_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let llm = LlmFileConfig {
            groq_api_key: Some("  ".into()),
            gemini_api_key: Some("g-key".into()),
            ..Default::default()
        };
        assert_eq!(llm.api_key(ProviderKind::Groq), None);
        assert_eq!(llm.api_key(ProviderKind::Gemini), Some("g-key"));
        assert_eq!(llm.api_key(ProviderKind::Ollama), None);
    }

    // ── YuiConfig ───────────────────────────────────────────────────────

    #[test]
    fn test_yui_config_with_custom_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = YuiConfig::new(Some(tmp.path().to_path_buf())).unwrap();

        assert_eq!(config.data_dir, tmp.path());
        assert_eq!(config.db_path, tmp.path().join("yui_memory.db"));
        assert_eq!(config.config_toml_path(), tmp.path().join("config.toml"));
    }

    #[test]
    fn test_db_url() {
        let tmp = tempfile::tempdir().unwrap();
        let config = YuiConfig::new(Some(tmp.path().to_path_buf())).unwrap();
        let url = config.db_url();
        assert!(url.starts_with("sqlite://"));
        assert!(url.contains("yui_memory.db"));
        assert!(url.ends_with("?mode=rwc"));
    }

    // ── load_config ─────────────────────────────────────────────────────

    #[test]
    fn test_load_config_defaults() {
        Jail::expect_with(|jail| {
            let fc: FileConfig = load_config(jail.directory(), None).extract()?;
            assert!(fc.profile.is_none());
            assert!(fc.server.host.is_none());
            assert!(fc.llm.groq_api_key.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_load_config_toml_overrides_profile() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[server]\nhost = \"10.0.0.5\"\nport = 9001\n")?;
            let fc: FileConfig = load_config(jail.directory(), Some(&Profile::Server)).extract()?;
            assert_eq!(fc.server.host.as_deref(), Some("10.0.0.5"));
            assert_eq!(fc.server.port, Some(9001));
            Ok(())
        });
    }

    #[test]
    fn test_load_config_profile_from_toml() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "profile = \"server\"\n")?;
            let fc: FileConfig = load_config(jail.directory(), None).extract()?;
            assert_eq!(fc.profile, Some(Profile::Server));
            assert_eq!(fc.server.host.as_deref(), Some("0.0.0.0"));
            Ok(())
        });
    }

    #[test]
    fn test_load_config_env_nesting() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[llm]\nprovider = \"groq\"\ntimeout_secs = 10\n")?;
            jail.set_env("YUI_LLM__PROVIDER", "ollama");
            jail.set_env("YUI_CHAT__MAX_HISTORY_TURNS", "4");
            jail.set_env("YUI_CHAT__DEFAULT_PERSONALITY", "jarvis");
            let fc: FileConfig = load_config(jail.directory(), None).extract()?;
            assert_eq!(fc.llm.provider, Some(ProviderKind::Ollama));
            assert_eq!(fc.llm.timeout_secs, 10);
            assert_eq!(fc.chat.max_history_turns, 4);
            assert_eq!(fc.chat.default_personality, Personality::Jarvis);
            Ok(())
        });
    }

    #[test]
    fn test_load_config_raw_provider_keys() {
        Jail::expect_with(|jail| {
            jail.set_env("GROQ_API_KEY", "gsk-raw");
            jail.set_env("COHERE_API_KEY", "co-raw");
            jail.set_env("YUI_LLM__COHERE_API_KEY", "co-prefixed");
            let fc: FileConfig = load_config(jail.directory(), None).extract()?;
            assert_eq!(fc.llm.groq_api_key.as_deref(), Some("gsk-raw"));
            // The prefixed form wins over the bare variable.
            assert_eq!(fc.llm.cohere_api_key.as_deref(), Some("co-prefixed"));
            Ok(())
        });
    }
}

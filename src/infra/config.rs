// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub billing: BillingConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8420,
            cors_origins: vec!["http://localhost:3000".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Credits granted when an account is first seen.
    pub starting_credits: i64,
    /// Balance at or below which the low-balance notifier fires.
    pub low_balance_threshold: i64,
    /// Credits charged per answered question.
    pub query_cost: i64,
    /// Unconfirmed reservations older than this are reverted.
    pub reservation_ttl_seconds: i64,
    /// Price per credit charged through the payment provider.
    pub credit_unit_price_usd: f64,
    pub payment_url: Option<String>,
    pub payment_api_key: Option<String>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            starting_credits: 10,
            low_balance_threshold: 3,
            query_cost: 1,
            reservation_ttl_seconds: 300,
            credit_unit_price_usd: 0.10,
            payment_url: None,
            payment_api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub ttl_hours: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_hours: 24 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Each source adapter gets this long before its results are dropped.
    pub per_source_timeout_ms: u64,
    /// How many items each adapter is asked for.
    pub per_source_limit: usize,
    /// Cap on the concatenated result list.
    pub max_items: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            per_source_timeout_ms: 8_000,
            per_source_limit: 5,
            max_items: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub snippet_max_chars: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            snippet_max_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub model: String,
    pub timeout_seconds: u64,
    pub max_attempts: u32,
    /// Falls back to GEMINI_API_KEY when unset.
    pub api_key: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".into(),
            timeout_seconds: 45,
            max_attempts: 3,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Semantic index service (account-scoped document search).
    pub semantic_url: Option<String>,
    /// Web search endpoint; falls back to SERPAPI_KEY for the key.
    pub web_search_url: Option<String>,
    pub web_search_api_key: Option<String>,
    /// Live feed service.
    pub live_feed_url: Option<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            semantic_url: Some("http://127.0.0.1:8901".into()),
            web_search_url: Some("https://serpapi.com/search".into()),
            web_search_api_key: None,
            live_feed_url: Some("http://127.0.0.1:8902".into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Optional webhook POSTed when an account drops below the threshold.
    pub low_balance_webhook: Option<String>,
}

impl Config {
    /// Load from the default config path, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&paths::config_file_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        Ok(config)
    }

    /// Resolve the generator API key (config first, then environment).
    pub fn generator_api_key(&self) -> Option<String> {
        self.generator
            .api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
    }

    /// Resolve the web search API key (config first, then environment).
    pub fn web_search_api_key(&self) -> Option<String> {
        self.sources
            .web_search_api_key
            .clone()
            .or_else(|| std::env::var("SERPAPI_KEY").ok())
    }
}

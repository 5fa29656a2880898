//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::shop::{Site, Source};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Storefront settings
    #[serde(default)]
    pub site: Site,

    /// Listings scanned for offers
    #[serde(default = "default_sources")]
    pub sources: Vec<Source>,

    /// Minimum discount percentage worth a notification
    #[serde(default = "default_threshold")]
    pub threshold: u8,

    /// Maximum candidate links taken from one source
    #[serde(default = "default_max_per_source")]
    pub max_per_source: usize,

    /// Maximum listing pages fetched per source
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Maximum notifications sent in one scan; the rest wait for the next run
    #[serde(default = "default_max_notifications")]
    pub max_notifications: usize,

    /// Characters of listing markup kept on each side of a product link that
    /// sits outside a card of its own; the window never crosses another product link
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,

    /// Fetch the product page when the listing fragment shows no discount
    #[serde(default = "default_true")]
    pub fetch_details: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Base delay between requests in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Random jitter added to delay (0 to this value)
    #[serde(default = "default_delay_jitter_ms")]
    pub delay_jitter_ms: u64,

    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Where notified offers are remembered between runs
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Maximum number of remembered offers
    #[serde(default = "default_state_cap")]
    pub state_cap: usize,

    /// Notification channel
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Filter: keywords that must appear in title
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Filter: keywords that must NOT appear in title
    #[serde(default)]
    pub exclude_keywords: Vec<String>,

    /// Filter: minimum current price
    #[serde(default)]
    pub min_price: Option<f64>,

    /// Filter: maximum current price
    #[serde(default)]
    pub max_price: Option<f64>,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,

    #[serde(default)]
    pub chat_id: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self { bot_token: None, chat_id: None, api_base: default_api_base() }
    }
}

fn default_sources() -> Vec<Source> {
    vec![Source::Category { url: "https://www.falabella.com.pe/falabella-pe/collection/ofertas".to_string() }]
}

fn default_threshold() -> u8 {
    50
}

fn default_max_per_source() -> usize {
    60
}

fn default_max_pages() -> u32 {
    3
}

fn default_max_notifications() -> usize {
    10
}

fn default_context_chars() -> usize {
    1500
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_delay_ms() -> u64 {
    1500
}

fn default_delay_jitter_ms() -> u64 {
    2000
}

fn default_state_file() -> PathBuf {
    PathBuf::from("state.json")
}

fn default_state_cap() -> usize {
    3000
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: Site::default(),
            sources: default_sources(),
            threshold: default_threshold(),
            max_per_source: default_max_per_source(),
            max_pages: default_max_pages(),
            max_notifications: default_max_notifications(),
            context_chars: default_context_chars(),
            fetch_details: true,
            timeout_secs: default_timeout_secs(),
            delay_ms: default_delay_ms(),
            delay_jitter_ms: default_delay_jitter_ms(),
            proxy: None,
            state_file: default_state_file(),
            state_cap: default_state_cap(),
            telegram: TelegramConfig::default(),
            keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            min_price: None,
            max_price: None,
            format: OutputFormat::Table,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        // 1. Explicit path takes precedence
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        // 2. Try current directory
        let local_config = Path::new("dealwatch.toml");
        if local_config.exists() {
            debug!("Found dealwatch.toml in current directory");
            return Self::from_file(local_config);
        }

        // 3. Try XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("dealwatch").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        // 4. Return default config
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    pub fn with_env(self) -> Self {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup; invalid values are ignored.
    pub fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(token) = var("DEALWATCH_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }

        if let Some(chat_id) = var("DEALWATCH_CHAT_ID") {
            self.telegram.chat_id = Some(chat_id);
        }

        if let Some(threshold) = var("DEALWATCH_THRESHOLD") {
            if let Ok(t) = threshold.parse() {
                self.threshold = t;
            }
        }

        if let Some(proxy) = var("DEALWATCH_PROXY") {
            self.proxy = Some(proxy);
        }

        if let Some(delay) = var("DEALWATCH_DELAY") {
            if let Ok(d) = delay.parse() {
                self.delay_ms = d;
            }
        }

        if let Some(path) = var("DEALWATCH_STATE_FILE") {
            self.state_file = PathBuf::from(path);
        }

        self
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use: table, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

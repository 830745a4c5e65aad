//! Configuration management for the opening-bell services.
//!
//! The service reads a single configuration file at `~/.bell/config.json`
//! (or an explicit path passed on the command line).
//!
//! # Configuration Priority
//!
//! 1. Environment variables (override file values)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `BELL_LOG_LEVEL` → observability.log_level
//! - `BELL_LOG_FORMAT` → observability.log_format
//! - `BELL_BOT_NAME` → bot.name
//! - `BELL_ENABLED_MARKETS` → enabled_markets (comma separated, e.g. `SET,NASDAQ`)
//! - `BOT_CLIENT_ID` → holidays.bot_client_id
//! - `DISCORD_WEBHOOK_ID` + `DISCORD_WEBHOOK_TOKEN` → appended to destinations
//! - `MARKET_SET_OPEN`, `MARKET_SET_CLOSE` → markets.SET.open_cron / close_cron
//! - `MARKET_NASDAQ_OPEN`, `MARKET_NASDAQ_CLOSE` → markets.NASDAQ.open_cron / close_cron
//!
//! # Example
//!
//! ```json
//! {
//!   "enabled_markets": ["SET"],
//!   "markets": {
//!     "SET": {
//!       "open_cron": "0 0 10 * * MON-FRI",
//!       "close_cron": "0 45 16 * * MON-FRI",
//!       "timezone": "Asia/Bangkok"
//!     }
//!   },
//!   "destinations": [{ "id": "123", "token": "abc" }],
//!   "holidays": { "bot_client_id": "client-id" }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".bell"),
        |dirs| dirs.home_dir().join(".bell"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration, as read from disk.
///
/// Values here are loosely typed (market names and cron expressions are
/// plain strings). The alert service validates them into typed settings at
/// startup and refuses to start on any inconsistency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Bot identity and behaviour
    #[serde(default)]
    pub bot: BotConfig,

    /// Markets to schedule alerts for (e.g. `["SET", "NASDAQ"]`)
    #[serde(default)]
    pub enabled_markets: Vec<String>,

    /// Per-market schedule and branding, keyed by market name
    #[serde(default)]
    pub markets: HashMap<String, MarketConfig>,

    /// Destinations used by every market that has none of its own
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,

    /// Holiday calendar APIs
    #[serde(default)]
    pub holidays: HolidayApiConfig,

    /// Market data endpoints
    #[serde(default)]
    pub data_sources: DataSourcesConfig,

    /// Timeouts and retries for external calls
    #[serde(default)]
    pub reliability: ReliabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("BELL_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("BELL_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(name) = lookup("BELL_BOT_NAME") {
            self.bot.name = name;
        }
        if let Some(markets) = lookup("BELL_ENABLED_MARKETS") {
            self.enabled_markets = markets
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(client_id) = lookup("BOT_CLIENT_ID") {
            self.holidays.bot_client_id = Some(client_id);
        }

        for code in OVERRIDABLE_MARKETS {
            let open = lookup(format!("MARKET_{code}_OPEN").as_str());
            let close = lookup(format!("MARKET_{code}_CLOSE").as_str());
            if open.is_none() && close.is_none() {
                continue;
            }
            let market = self.market_entry(code);
            if open.is_some() {
                market.open_cron = open;
            }
            if close.is_some() {
                market.close_cron = close;
            }
        }

        // Single-webhook deployments configure the destination through the environment only
        if let (Some(id), Some(token)) = (lookup("DISCORD_WEBHOOK_ID"), lookup("DISCORD_WEBHOOK_TOKEN")) {
            if !self.destinations.iter().any(|d| d.id == id) {
                self.destinations.push(DestinationConfig { id, token });
            }
        }
    }

    /// Market section for `code`, created if missing. Existing keys match ignoring case.
    fn market_entry(&mut self, code: &str) -> &mut MarketConfig {
        let key = self
            .markets
            .keys()
            .find(|key| key.eq_ignore_ascii_case(code))
            .cloned()
            .unwrap_or_else(|| code.to_string());
        self.markets.entry(key).or_default()
    }

    /// Look up a market section by name, ignoring case.
    pub fn market(&self, name: &str) -> Option<&MarketConfig> {
        self.markets
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, cfg)| cfg)
    }
}

/// Markets whose cron expressions can be set from the environment.
const OVERRIDABLE_MARKETS: [&str; 2] = ["SET", "NASDAQ"];

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to hold at `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Bot
// ============================================================================

/// Bot identity and gate behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Sender display name on delivered messages
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// What to do when the holiday calendar cannot be fetched:
    /// `"skip"` aborts the tick, `"assume_trading_day"` treats the day as open.
    #[serde(default = "default_holiday_failure_policy")]
    pub holiday_failure_policy: String,

    /// Discord API base URL (overridable for tests and proxies)
    #[serde(default = "default_discord_api_base")]
    pub discord_api_base: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            holiday_failure_policy: default_holiday_failure_policy(),
            discord_api_base: default_discord_api_base(),
        }
    }
}

fn default_bot_name() -> String {
    "Opening Bell".into()
}

fn default_holiday_failure_policy() -> String {
    "skip".into()
}

fn default_discord_api_base() -> String {
    "https://discord.com".into()
}

// ============================================================================
// Markets & Destinations
// ============================================================================

/// Schedule and branding for a single market.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Cron expression for the market-open alert
    #[serde(default)]
    pub open_cron: Option<String>,

    /// Cron expression for the closing briefing
    #[serde(default, alias = "briefing_cron")]
    pub close_cron: Option<String>,

    /// IANA timezone the cron expressions are evaluated in
    #[serde(default)]
    pub timezone: Option<String>,

    /// Link attached to the alert title
    #[serde(default)]
    pub url: Option<String>,

    /// Thumbnail image URL
    #[serde(default)]
    pub icon_url: Option<String>,

    /// Banner image URL
    #[serde(default)]
    pub banner_url: Option<String>,

    /// Market-specific destinations (override the global list when non-empty)
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
}

/// A single webhook destination.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DestinationConfig {
    pub id: String,
    pub token: String,
}

impl std::fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("id", &self.id)
            .field("token", &"***")
            .finish()
    }
}

// ============================================================================
// External APIs
// ============================================================================

/// Holiday calendar API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayApiConfig {
    /// Bank of Thailand API client id (required when SET is enabled)
    #[serde(default)]
    pub bot_client_id: Option<String>,

    /// Bank of Thailand API base URL
    #[serde(default = "default_bot_base_url")]
    pub bot_base_url: String,

    /// Nager.Date public holiday API base URL
    #[serde(default = "default_nager_base_url")]
    pub nager_base_url: String,
}

impl Default for HolidayApiConfig {
    fn default() -> Self {
        Self {
            bot_client_id: None,
            bot_base_url: default_bot_base_url(),
            nager_base_url: default_nager_base_url(),
        }
    }
}

fn default_bot_base_url() -> String {
    "https://apigw1.bot.or.th/bot/public".into()
}

fn default_nager_base_url() -> String {
    "https://date.nager.at".into()
}

/// Market data source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourcesConfig {
    /// Page scraped for the SET index summary
    #[serde(default = "default_settrade_url")]
    pub settrade_url: String,

    /// NASDAQ quote API base URL
    #[serde(default = "default_nasdaq_api_base")]
    pub nasdaq_api_base: String,

    /// User-Agent sent to the NASDAQ API
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Explicit Chrome/Chromium binary (auto-detected when unset)
    #[serde(default)]
    pub chrome_executable: Option<String>,
}

impl Default for DataSourcesConfig {
    fn default() -> Self {
        Self {
            settrade_url: default_settrade_url(),
            nasdaq_api_base: default_nasdaq_api_base(),
            user_agent: default_user_agent(),
            chrome_executable: None,
        }
    }
}

fn default_settrade_url() -> String {
    "https://www.settrade.com/th/home".into()
}

fn default_nasdaq_api_base() -> String {
    "https://api.nasdaq.com".into()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3".into()
}

/// Timeouts and retries applied to every external call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    /// Timeout for HTTP calls (holiday APIs, quote API, webhooks)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for a full headless-browser scrape
    #[serde(default = "default_browser_timeout_secs")]
    pub browser_timeout_secs: u64,

    /// Retries after the first attempt on transient failures
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Delay before each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            browser_timeout_secs: default_browser_timeout_secs(),
            retries: default_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_browser_timeout_secs() -> u64 {
    60
}

fn default_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

//! Error taxonomy for the alert pipeline.
//!
//! - [`ConfigurationError`] is fatal at startup.
//! - [`HolidaySourceError`], [`ScrapeError`] and [`MarketDataError`] abort a
//!   single tick and are reported through [`TickError`].
//! - [`DeliveryError`] is scoped to one destination and never aborts siblings.

use thiserror::Error;

use crate::market::{Market, Region};

/// Missing or invalid settings. The process must not start.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("No markets enabled")]
    NoMarketsEnabled,

    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    #[error("Market {0} is not enabled")]
    MarketNotEnabled(Market),

    #[error("Market {market} is enabled but has no {field} configured")]
    MissingField { market: Market, field: &'static str },

    #[error("Invalid cron expression for {market} {field} '{expression}': {reason}")]
    InvalidCron {
        market: Market,
        field: &'static str,
        expression: String,
        reason: String,
    },

    #[error("Invalid timezone for {market}: '{timezone}'")]
    InvalidTimezone { market: Market, timezone: String },

    #[error("Market {0} has no delivery destinations")]
    NoDestinations(Market),

    #[error("Invalid holiday failure policy '{0}' (expected 'skip' or 'assume_trading_day')")]
    InvalidFailurePolicy(String),
}

/// Failure to obtain a holiday calendar.
#[derive(Debug, Clone, Error)]
pub enum HolidaySourceError {
    #[error("Holiday API network error ({region}): {message}")]
    Network { region: Region, message: String },

    #[error("Holiday API returned HTTP {status} ({region})")]
    Http { region: Region, status: u16 },

    #[error("Holiday API response malformed ({region}): {message}")]
    Malformed { region: Region, message: String },

    #[error("Holiday API timed out ({region})")]
    Timeout { region: Region },

    #[error("No holiday source registered for region {0}")]
    NoSource(Region),
}

impl HolidaySourceError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::Malformed { .. } | Self::NoSource(_) => false,
        }
    }
}

/// An expected page element is missing: the page layout changed.
///
/// Deliberately separate from network failures so operators can tell a site
/// redesign from a site outage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Element for '{field}' not found on {url} (selector: {selector})")]
pub struct ScrapeError {
    pub field: &'static str,
    pub selector: String,
    pub url: String,
}

/// Failure to retrieve or normalize a market snapshot.
#[derive(Debug, Clone, Error)]
pub enum MarketDataError {
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error("Market data network error: {0}")]
    Network(String),

    #[error("Market data request returned HTTP {status}")]
    Http { status: u16 },

    #[error("Market data request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Headless browser failure: {0}")]
    Browser(String),

    #[error("Cannot parse {field} from '{raw}'")]
    Parse { field: &'static str, raw: String },

    #[error("Malformed market data response: {0}")]
    Malformed(String),

    #[error("Provider {provider} does not support market {market}")]
    UnsupportedMarket {
        provider: &'static str,
        market: Market,
    },
}

impl MarketDataError {
    /// Whether this failure means the page layout changed.
    pub fn is_scrape(&self) -> bool {
        matches!(self, Self::Scrape(_))
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout { .. } | Self::Browser(_) => true,
            Self::Http { status } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Delivery failure for a single destination.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Destination rejected credentials (HTTP {status})")]
    Auth { status: u16 },

    #[error("Rate limited by destination")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Destination returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Delivery network error: {0}")]
    Network(String),

    #[error("Delivery timed out")]
    Timeout,
}

impl DeliveryError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Auth { .. } | Self::RateLimited { .. } => false,
        }
    }
}

/// A per-tick failure, caught at the pipeline boundary.
#[derive(Debug, Clone, Error)]
pub enum TickError {
    #[error(transparent)]
    HolidaySource(#[from] HolidaySourceError),

    #[error(transparent)]
    MarketData(#[from] MarketDataError),
}

impl TickError {
    /// Short error kind for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HolidaySource(_) => "holiday_source",
            Self::MarketData(e) if e.is_scrape() => "scrape",
            Self::MarketData(_) => "market_data",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_error_is_distinct_kind() {
        let scrape: TickError = MarketDataError::from(ScrapeError {
            field: "index",
            selector: "h2".into(),
            url: "https://example.com".into(),
        })
        .into();
        let timeout: TickError = MarketDataError::Timeout { secs: 60 }.into();

        assert_eq!(scrape.kind(), "scrape");
        assert_eq!(timeout.kind(), "market_data");
        assert!(scrape.to_string().contains("index"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(MarketDataError::Network("reset".into()).is_transient());
        assert!(!MarketDataError::Http { status: 404 }.is_transient());
        assert!(MarketDataError::Http { status: 503 }.is_transient());
        assert!(!DeliveryError::Auth { status: 401 }.is_transient());
        assert!(HolidaySourceError::Timeout { region: Region::Thailand }.is_transient());
        assert!(!HolidaySourceError::Malformed {
            region: Region::Thailand,
            message: "bad".into()
        }
        .is_transient());
    }

    #[test]
    fn test_configuration_error_display() {
        let err = ConfigurationError::MissingField {
            market: Market::Set,
            field: "close_cron",
        };
        assert_eq!(err.to_string(), "Market SET is enabled but has no close_cron configured");
    }
}

//! NASDAQ quote API adapter for the NASDAQ Composite (COMP).
//!
//! # Endpoint
//! `GET {base}/api/quote/COMP/info?assetclass=index`
//!
//! The API rejects requests without a browser-like `User-Agent`. Every
//! numeric field is returned as display text (`"17,754.09"`, `"+0.13%"`), and
//! the day range as a single `"low - high"` string.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use bell_common::{DataSourcesConfig, ReliabilityConfig};

use super::parse::{parse_number, parse_percent, parse_range};
use super::provider::{ensure_market, MarketDataProvider};
use crate::error::MarketDataError;
use crate::market::{Market, MarketIndexSnapshot};
use crate::resilience::{call_with_policy, CallPolicy};

// ============================================================================
// Constants
// ============================================================================

/// Quote endpoint for the composite index
const COMP_INFO_ENDPOINT: &str = "/api/quote/COMP/info";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    data: Option<QuoteData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteData {
    primary_data: PrimaryData,
    key_stats: KeyStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrimaryData {
    last_sale_price: String,
    net_change: String,
    percentage_change: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStats {
    dayrange: LabeledValue,
}

#[derive(Debug, Deserialize)]
struct LabeledValue {
    value: String,
}

impl QuoteData {
    fn into_snapshot(self) -> Result<MarketIndexSnapshot, MarketDataError> {
        let (low, high) = parse_range("day_range", &self.key_stats.dayrange.value)?;

        Ok(MarketIndexSnapshot {
            market: Market::Nasdaq,
            index: parse_number("index", &self.primary_data.last_sale_price)?,
            change: parse_number("change", &self.primary_data.net_change)?,
            percent_change: parse_percent("percent_change", &self.primary_data.percentage_change)?,
            high,
            low,
            volume: None,
            value: None,
        })
    }
}

// ============================================================================
// NASDAQ Adapter
// ============================================================================

/// API-based snapshot provider for the NASDAQ Composite.
pub struct NasdaqApiProvider {
    base_url: String,
    user_agent: String,
    client: reqwest::Client,
    policy: CallPolicy,
}

impl NasdaqApiProvider {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>, policy: CallPolicy) -> Self {
        let client = reqwest::Client::builder()
            .timeout(policy.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
            client,
            policy,
        }
    }

    /// Create from config
    pub fn from_config(sources: &DataSourcesConfig, reliability: &ReliabilityConfig) -> Self {
        Self::new(
            sources.nasdaq_api_base.clone(),
            sources.user_agent.clone(),
            CallPolicy::http(reliability),
        )
    }

    fn map_reqwest(&self, e: reqwest::Error) -> MarketDataError {
        if e.is_timeout() {
            MarketDataError::Timeout {
                secs: self.policy.timeout.as_secs(),
            }
        } else if e.is_connect() {
            MarketDataError::Network("Connection failed".into())
        } else {
            MarketDataError::Network(e.to_string())
        }
    }

    async fn fetch_quote(&self) -> Result<MarketIndexSnapshot, MarketDataError> {
        let url = format!("{}{}", self.base_url, COMP_INFO_ENDPOINT);
        debug!(url = %url, "Fetching NASDAQ composite quote");

        let response = self
            .client
            .get(&url)
            .query(&[("assetclass", "index")])
            .header("user-agent", &self.user_agent)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError::Http {
                status: status.as_u16(),
            });
        }

        let body: QuoteResponse = response
            .json()
            .await
            .map_err(|e| MarketDataError::Malformed(format!("Failed to parse response: {}", e)))?;

        let data = body
            .data
            .ok_or_else(|| MarketDataError::Malformed("response has no data section".into()))?;

        data.into_snapshot()
    }
}

#[async_trait]
impl MarketDataProvider for NasdaqApiProvider {
    fn name(&self) -> &'static str {
        "nasdaq_api"
    }

    async fn get_index_snapshot(&self, market: Market) -> Result<MarketIndexSnapshot, MarketDataError> {
        ensure_market(self.name(), Market::Nasdaq, market)?;

        let timeout_secs = self.policy.timeout.as_secs();
        let snapshot = call_with_policy(
            &self.policy,
            self.name(),
            || MarketDataError::Timeout { secs: timeout_secs },
            || self.fetch_quote(),
        )
        .await?;

        info!(
            index = snapshot.index,
            change = snapshot.change,
            percent_change = snapshot.percent_change,
            "Fetched NASDAQ composite snapshot"
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn provider_for(base_url: &str) -> NasdaqApiProvider {
        NasdaqApiProvider::new(base_url, "test-agent", CallPolicy::once(Duration::from_secs(1)))
    }

    const SAMPLE: &str = r#"{
        "data": {
            "symbol": "COMP",
            "primaryData": {
                "lastSalePrice": "17,754.09",
                "netChange": "-23.45",
                "percentageChange": "-0.13%",
                "isRealTime": true
            },
            "keyStats": {
                "previousclose": { "label": "Previous Close", "value": "17,777.54" },
                "dayrange": { "label": "Day Range", "value": "17,600.12 - 17,801.55" }
            }
        },
        "status": { "rCode": 200 }
    }"#;

    #[test]
    fn test_parse_quote_response() {
        let response: QuoteResponse = serde_json::from_str(SAMPLE).unwrap();
        let snapshot = response.data.unwrap().into_snapshot().unwrap();

        assert_eq!(snapshot.market, Market::Nasdaq);
        assert_eq!(snapshot.index, 17754.09);
        assert_eq!(snapshot.change, -23.45);
        assert_eq!(snapshot.percent_change, -0.13);
        assert_eq!(snapshot.low, 17600.12);
        assert_eq!(snapshot.high, 17801.55);
        assert!(snapshot.volume.is_none());
        assert!(snapshot.value.is_none());
    }

    #[test]
    fn test_null_data_section() {
        let response: QuoteResponse =
            serde_json::from_str(r#"{ "data": null, "status": { "rCode": 400 } }"#).unwrap();
        assert!(response.data.is_none());
    }

    #[test]
    fn test_bad_day_range_is_parse_error() {
        let json = SAMPLE.replace("17,600.12 - 17,801.55", "N/A");
        let response: QuoteResponse = serde_json::from_str(&json).unwrap();
        let err = response.data.unwrap().into_snapshot().unwrap_err();
        assert!(matches!(err, MarketDataError::Parse { field: "day_range", .. }));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let provider = provider_for("http://localhost:1234/");
        assert_eq!(provider.base_url, "http://localhost:1234");
    }

    #[tokio::test]
    async fn test_rejects_other_markets() {
        let provider = provider_for("http://127.0.0.1:9");
        let err = provider.get_index_snapshot(Market::Set).await.unwrap_err();
        assert!(matches!(err, MarketDataError::UnsupportedMarket { provider: "nasdaq_api", .. }));
    }
}

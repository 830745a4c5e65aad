//! Bank of Thailand financial-institution holiday API.
//!
//! # Endpoint
//! `GET {base}/financial-institutions-holidays?year=YYYY`
//!
//! Authenticated with the `x-ibm-client-id` header. Response shape:
//!
//! ```json
//! { "result": { "data": [ { "Date": "2024-01-01", "HolidayDescription": "..." } ] } }
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use bell_common::{HolidayApiConfig, ReliabilityConfig};

use super::source::{collect_holidays, map_transport_error, HolidayCalendarSource, HolidaySet};
use crate::error::HolidaySourceError;
use crate::market::Region;
use crate::resilience::{call_with_policy, CallPolicy};

const HOLIDAYS_ENDPOINT: &str = "/financial-institutions-holidays";

#[derive(Debug, Deserialize)]
struct BotResponse {
    result: BotResult,
}

#[derive(Debug, Deserialize)]
struct BotResult {
    #[serde(default)]
    data: Vec<BotHoliday>,
}

#[derive(Debug, Deserialize)]
struct BotHoliday {
    #[serde(rename = "Date")]
    date: String,
}

/// Thai financial-institution holidays from the Bank of Thailand.
pub struct BotHolidaySource {
    base_url: String,
    client_id: String,
    client: reqwest::Client,
    policy: CallPolicy,
}

impl BotHolidaySource {
    pub fn new(base_url: impl Into<String>, client_id: impl Into<String>, policy: CallPolicy) -> Self {
        let client = reqwest::Client::builder()
            .timeout(policy.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client,
            policy,
        }
    }

    /// Create from config. Returns `None` when no client id is configured.
    pub fn from_config(holidays: &HolidayApiConfig, reliability: &ReliabilityConfig) -> Option<Self> {
        let client_id = holidays.bot_client_id.as_deref()?;
        Some(Self::new(
            holidays.bot_base_url.clone(),
            client_id,
            CallPolicy::http(reliability),
        ))
    }

    async fn fetch_once(&self, year: i32) -> Result<HolidaySet, HolidaySourceError> {
        let region = self.region();
        let url = format!("{}{}", self.base_url, HOLIDAYS_ENDPOINT);
        debug!(url = %url, year, "Fetching Thai holidays");

        let response = self
            .client
            .get(&url)
            .query(&[("year", year)])
            .header("x-ibm-client-id", &self.client_id)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| map_transport_error(region, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HolidaySourceError::Http {
                region,
                status: status.as_u16(),
            });
        }

        let body: BotResponse = response.json().await.map_err(|e| HolidaySourceError::Malformed {
            region,
            message: format!("Failed to parse response: {}", e),
        })?;

        let holidays = collect_holidays(region, body.result.data.iter().map(|h| h.date.as_str()))?;
        debug!(year, count = holidays.len(), "Found Thai holidays");
        Ok(holidays)
    }
}

#[async_trait]
impl HolidayCalendarSource for BotHolidaySource {
    fn region(&self) -> Region {
        Region::Thailand
    }

    async fn fetch_holidays(&self, year: i32) -> Result<HolidaySet, HolidaySourceError> {
        call_with_policy(
            &self.policy,
            "bot_holidays",
            || HolidaySourceError::Timeout {
                region: Region::Thailand,
            },
            || self.fetch_once(year),
        )
        .await
    }
}

impl std::fmt::Debug for BotHolidaySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotHolidaySource")
            .field("base_url", &self.base_url)
            .field("client_id", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_bot_response() {
        let json = r#"{
            "result": {
                "api": "Financial Institutions' Holidays",
                "timestamp": "2024-01-02 10:00:00",
                "data": [
                    { "HolidayWeekDay": "Monday", "Date": "2024-01-01", "HolidayDescription": "New Year's Day" },
                    { "HolidayWeekDay": "Monday", "Date": "2024-04-15", "HolidayDescription": "Songkran Festival" }
                ]
            }
        }"#;
        let body: BotResponse = serde_json::from_str(json).unwrap();
        let set = collect_holidays(Region::Thailand, body.result.data.iter().map(|h| h.date.as_str())).unwrap();

        assert_eq!(set.len(), 2);
        assert!(set.contains(&NaiveDate::from_ymd_opt(2024, 4, 15).unwrap()));
    }

    #[test]
    fn test_from_config_requires_client_id() {
        let reliability = ReliabilityConfig::default();
        assert!(BotHolidaySource::from_config(&HolidayApiConfig::default(), &reliability).is_none());

        let holidays = HolidayApiConfig {
            bot_client_id: Some("client-123".into()),
            ..Default::default()
        };
        let source = BotHolidaySource::from_config(&holidays, &reliability).unwrap();
        assert_eq!(source.region(), Region::Thailand);
        assert!(!format!("{source:?}").contains("client-123"));
    }
}

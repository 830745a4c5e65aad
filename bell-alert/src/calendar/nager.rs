//! Nager.Date public holiday API, used for the US calendar.
//!
//! `GET {base}/api/v3/PublicHolidays/{year}/US` returns a JSON array of
//! `{ "date": "2024-07-04", "localName": "...", "global": true, ... }` objects.
//! Entries with `"global": false` only apply to some states and are ignored.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use bell_common::{HolidayApiConfig, ReliabilityConfig};

use super::source::{collect_holidays, map_transport_error, HolidayCalendarSource, HolidaySet};
use crate::error::HolidaySourceError;
use crate::market::Region;
use crate::resilience::{call_with_policy, CallPolicy};

#[derive(Debug, Deserialize)]
struct PublicHoliday {
    date: String,
    #[serde(default = "default_global")]
    global: bool,
}

fn default_global() -> bool {
    true
}

/// Dates of holidays observed nationwide.
fn nationwide_dates(holidays: &[PublicHoliday]) -> impl Iterator<Item = &str> {
    holidays.iter().filter(|h| h.global).map(|h| h.date.as_str())
}

/// US public holidays from Nager.Date.
pub struct NagerHolidaySource {
    base_url: String,
    country_code: &'static str,
    client: reqwest::Client,
    policy: CallPolicy,
}

impl NagerHolidaySource {
    pub fn new(base_url: impl Into<String>, policy: CallPolicy) -> Self {
        let client = reqwest::Client::builder()
            .timeout(policy.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            country_code: "US",
            client,
            policy,
        }
    }

    /// Create from config
    pub fn from_config(holidays: &HolidayApiConfig, reliability: &ReliabilityConfig) -> Self {
        Self::new(holidays.nager_base_url.clone(), CallPolicy::http(reliability))
    }

    async fn fetch_once(&self, year: i32) -> Result<HolidaySet, HolidaySourceError> {
        let region = self.region();
        let url = format!(
            "{}/api/v3/PublicHolidays/{}/{}",
            self.base_url, year, self.country_code
        );
        debug!(url = %url, "Fetching US holidays");

        let response = self
            .client
            .get(&url)
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

        let body: Vec<PublicHoliday> = response.json().await.map_err(|e| HolidaySourceError::Malformed {
            region,
            message: format!("Failed to parse response: {}", e),
        })?;

        let holidays = collect_holidays(region, nationwide_dates(&body))?;
        debug!(year, count = holidays.len(), "Found US holidays");
        Ok(holidays)
    }
}

#[async_trait]
impl HolidayCalendarSource for NagerHolidaySource {
    fn region(&self) -> Region {
        Region::UnitedStates
    }

    async fn fetch_holidays(&self, year: i32) -> Result<HolidaySet, HolidaySourceError> {
        call_with_policy(
            &self.policy,
            "nager_holidays",
            || HolidaySourceError::Timeout {
                region: Region::UnitedStates,
            },
            || self.fetch_once(year),
        )
        .await
    }
}

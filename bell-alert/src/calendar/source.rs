//! Holiday calendar source abstraction.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::HolidaySourceError;
use crate::market::Region;

/// Non-trading dates for one region and year. Membership only.
pub type HolidaySet = HashSet<NaiveDate>;

/// Supplies the holiday calendar for one region.
#[async_trait]
pub trait HolidayCalendarSource: Send + Sync {
    /// Region this source covers
    fn region(&self) -> Region;

    /// Fetch every holiday in `year`. Called fresh on each tick; no caching.
    async fn fetch_holidays(&self, year: i32) -> Result<HolidaySet, HolidaySourceError>;
}

/// Shared source handle.
pub type SharedHolidaySource = Arc<dyn HolidayCalendarSource>;

/// Parse an API date string into a calendar date.
///
/// Accepts a plain ISO date (`2024-01-01`) and tolerates a trailing time
/// component (`2024-01-01T00:00:00`, `2024-01-01 00:00:00`).
pub fn normalize_holiday_date(region: Region, raw: &str) -> Result<NaiveDate, HolidaySourceError> {
    let date_part = raw.trim().split(['T', ' ']).next().unwrap_or_default();

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| HolidaySourceError::Malformed {
        region,
        message: format!("invalid holiday date '{}': {}", raw, e),
    })
}

/// Normalize a list of raw dates into a [`HolidaySet`]; one bad date fails the set.
pub fn collect_holidays<'a, I>(region: Region, raw_dates: I) -> Result<HolidaySet, HolidaySourceError>
where
    I: IntoIterator<Item = &'a str>,
{
    raw_dates
        .into_iter()
        .map(|raw| normalize_holiday_date(region, raw))
        .collect()
}

/// Map a reqwest transport error into the holiday error taxonomy.
pub(crate) fn map_transport_error(region: Region, e: reqwest::Error) -> HolidaySourceError {
    if e.is_timeout() {
        HolidaySourceError::Timeout { region }
    } else if e.is_connect() {
        HolidaySourceError::Network {
            region,
            message: "Connection failed".into(),
        }
    } else {
        HolidaySourceError::Network {
            region,
            message: e.to_string(),
        }
    }
}

//! Trading-day gate.
//!
//! Decides whether a market trades on the calendar day containing a given
//! instant, evaluated in the market's own timezone:
//!
//! 1. Saturday or Sunday: closed, no holiday source is consulted
//! 2. Otherwise the region's holiday set for the local year is fetched
//! 3. Open unless the local date is in that set

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::source::{HolidaySet, SharedHolidaySource};
use crate::error::{ConfigurationError, HolidaySourceError};
use crate::market::{Market, Region};

// ============================================================================
// Failure Policy
// ============================================================================

/// What the gate does when the holiday calendar cannot be fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HolidayFailurePolicy {
    /// Propagate the error; the tick is aborted and nothing is sent
    #[default]
    Skip,
    /// Log a warning and treat the day as a trading day
    AssumeTradingDay,
}

impl fmt::Display for HolidayFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::AssumeTradingDay => write!(f, "assume_trading_day"),
        }
    }
}

impl FromStr for HolidayFailurePolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "skip" => Ok(Self::Skip),
            "assume_trading_day" | "assume_open" => Ok(Self::AssumeTradingDay),
            _ => Err(ConfigurationError::InvalidFailurePolicy(s.to_string())),
        }
    }
}

// ============================================================================
// Gate
// ============================================================================

/// Local calendar date of `reference` in the market's timezone.
pub fn local_date(market: Market, reference: DateTime<Utc>) -> NaiveDate {
    reference.with_timezone(&market.timezone()).date_naive()
}

/// Whether `date` falls on a weekend.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Trading-day gate over one holiday source per region.
#[derive(Clone, Default)]
pub struct TradingDayGate {
    sources: HashMap<Region, SharedHolidaySource>,
    policy: HolidayFailurePolicy,
}

impl TradingDayGate {
    pub fn new(policy: HolidayFailurePolicy) -> Self {
        Self {
            sources: HashMap::new(),
            policy,
        }
    }

    /// Register the holiday source for its region.
    pub fn with_source(mut self, source: SharedHolidaySource) -> Self {
        self.sources.insert(source.region(), source);
        self
    }

    pub fn policy(&self) -> HolidayFailurePolicy {
        self.policy
    }

    /// Whether a source is registered for `market`'s region.
    pub fn covers(&self, market: Market) -> bool {
        self.sources.contains_key(&market.region())
    }

    async fn holidays_for(&self, market: Market, year: i32) -> Result<HolidaySet, HolidaySourceError> {
        let region = market.region();
        let source = self
            .sources
            .get(&region)
            .ok_or(HolidaySourceError::NoSource(region))?;
        source.fetch_holidays(year).await
    }

    /// Decide whether `market` trades on the local day containing `reference`.
    pub async fn is_trading_day(&self, market: Market, reference: DateTime<Utc>) -> Result<bool, HolidaySourceError> {
        let date = local_date(market, reference);

        if is_weekend(date) {
            debug!(market = %market, date = %date, "Weekend, market closed");
            return Ok(false);
        }

        let holidays = match self.holidays_for(market, date.year()).await {
            Ok(holidays) => holidays,
            Err(e) => match self.policy {
                HolidayFailurePolicy::Skip => return Err(e),
                HolidayFailurePolicy::AssumeTradingDay => {
                    warn!(
                        market = %market,
                        date = %date,
                        error = %e,
                        "Holiday calendar unavailable, assuming trading day"
                    );
                    HolidaySet::new()
                }
            },
        };

        let open = !holidays.contains(&date);
        info!(market = %market, date = %date, trading_day = open, "Trading day checked");
        Ok(open)
    }
}

impl fmt::Debug for TradingDayGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let regions: Vec<String> = self.sources.keys().map(|r| r.to_string()).collect();
        f.debug_struct("TradingDayGate")
            .field("regions", &regions)
            .field("policy", &self.policy)
            .finish()
    }
}

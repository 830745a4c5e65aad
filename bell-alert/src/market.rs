//! Markets, alert kinds and the normalized index snapshot.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Market
// ============================================================================

/// A tracked index/exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    /// Stock Exchange of Thailand (SET Index)
    Set,
    /// NASDAQ Composite (COMP)
    Nasdaq,
}

impl Market {
    /// All supported markets.
    pub const ALL: [Market; 2] = [Market::Set, Market::Nasdaq];

    /// Canonical upper-case code, as used in configuration.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Set => "SET",
            Self::Nasdaq => "NASDAQ",
        }
    }

    /// Exchange-local timezone, used to decide which calendar day it is.
    pub fn timezone(&self) -> Tz {
        match self {
            Self::Set => chrono_tz::Asia::Bangkok,
            Self::Nasdaq => chrono_tz::America::New_York,
        }
    }

    /// Holiday region whose calendar closes this market.
    pub fn region(&self) -> Region {
        match self {
            Self::Set => Region::Thailand,
            Self::Nasdaq => Region::UnitedStates,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SET" => Ok(Self::Set),
            "NASDAQ" | "COMP" => Ok(Self::Nasdaq),
            other => Err(format!("unknown market '{other}'")),
        }
    }
}

/// Holiday calendar region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Thailand,
    UnitedStates,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thailand => write!(f, "TH"),
            Self::UnitedStates => write!(f, "US"),
        }
    }
}

// ============================================================================
// Alert Kind
// ============================================================================

/// Which notification variant a trigger produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Sent shortly after the opening bell
    MarketOpen,
    /// Sent after the close
    MarketBriefing,
}

impl AlertKind {
    /// Get kind name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::MarketOpen => "market_open",
            Self::MarketBriefing => "market_briefing",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "open" | "market_open" => Ok(Self::MarketOpen),
            "briefing" | "close" | "summary" | "market_briefing" | "market_summary" => {
                Ok(Self::MarketBriefing)
            }
            other => Err(format!("unknown alert kind '{other}'")),
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// A single point-in-time read of an index and its daily statistics.
///
/// `volume` and `value` are only reported by markets that publish them
/// (SET: thousand shares / million THB).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIndexSnapshot {
    pub market: Market,
    pub index: f64,
    pub change: f64,
    pub percent_change: f64,
    pub high: f64,
    pub low: f64,
    pub volume: Option<f64>,
    pub value: Option<f64>,
}

//! Validated, typed alert settings.
//!
//! [`bell_common::Config`] is deserialized loosely; this module checks it
//! once at startup and produces settings the rest of the service can rely
//! on. Any inconsistency is a [`ConfigurationError`] and the process does not
//! start.

use chrono_tz::Tz;
use std::time::Duration;

use bell_common::{Config, DataSourcesConfig, HolidayApiConfig, ReliabilityConfig};

use crate::calendar::HolidayFailurePolicy;
use crate::composer::MarketBranding;
use crate::dispatch::DestinationEndpoint;
use crate::error::ConfigurationError;
use crate::market::{AlertKind, Market};
use crate::scheduler::Trigger;

/// Schedule, branding and destinations for one enabled market.
#[derive(Debug, Clone)]
pub struct MarketSettings {
    pub market: Market,
    pub open_cron: String,
    pub close_cron: String,
    pub timezone: Tz,
    pub branding: MarketBranding,
    pub destinations: Vec<DestinationEndpoint>,
}

impl MarketSettings {
    /// The market-open and briefing triggers for this market.
    pub fn triggers(&self) -> Result<Vec<Trigger>, ConfigurationError> {
        Ok(vec![
            Trigger::new(self.market, AlertKind::MarketOpen, &self.open_cron, self.timezone)?,
            Trigger::new(self.market, AlertKind::MarketBriefing, &self.close_cron, self.timezone)?,
        ])
    }
}

/// Everything the alert service needs, validated.
#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub bot_name: String,
    pub discord_api_base: String,
    pub failure_policy: HolidayFailurePolicy,
    pub markets: Vec<MarketSettings>,
    pub holidays: HolidayApiConfig,
    pub data_sources: DataSourcesConfig,
    pub reliability: ReliabilityConfig,
}

impl AlertSettings {
    /// Validate `config`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigurationError> {
        let failure_policy: HolidayFailurePolicy = config.bot.holiday_failure_policy.parse()?;

        let mut enabled: Vec<Market> = Vec::new();
        for name in &config.enabled_markets {
            let market: Market = name
                .parse()
                .map_err(|_| ConfigurationError::UnknownMarket(name.clone()))?;
            if !enabled.contains(&market) {
                enabled.push(market);
            }
        }

        if enabled.is_empty() {
            return Err(ConfigurationError::NoMarketsEnabled);
        }

        let markets = enabled
            .into_iter()
            .map(|market| market_settings(config, market))
            .collect::<Result<Vec<_>, _>>()?;

        if markets.iter().any(|m| m.market == Market::Set)
            && config.holidays.bot_client_id.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigurationError::MissingField {
                market: Market::Set,
                field: "holidays.bot_client_id",
            });
        }

        Ok(Self {
            bot_name: config.bot.name.clone(),
            discord_api_base: config.bot.discord_api_base.clone(),
            failure_policy,
            markets,
            holidays: config.holidays.clone(),
            data_sources: config.data_sources.clone(),
            reliability: config.reliability.clone(),
        })
    }

    /// Settings for `market`, if it is enabled.
    pub fn market(&self, market: Market) -> Option<&MarketSettings> {
        self.markets.iter().find(|m| m.market == market)
    }

    /// Every trigger of every enabled market.
    pub fn triggers(&self) -> Result<Vec<Trigger>, ConfigurationError> {
        let mut triggers = Vec::with_capacity(self.markets.len() * 2);
        for market in &self.markets {
            triggers.extend(market.triggers()?);
        }
        Ok(triggers)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.reliability.request_timeout_secs)
    }
}

fn market_settings(config: &Config, market: Market) -> Result<MarketSettings, ConfigurationError> {
    let section = config.market(market.code());

    let open_cron = section
        .and_then(|s| s.open_cron.clone())
        .filter(|c| !c.trim().is_empty())
        .ok_or(ConfigurationError::MissingField {
            market,
            field: "open_cron",
        })?;
    let close_cron = section
        .and_then(|s| s.close_cron.clone())
        .filter(|c| !c.trim().is_empty())
        .ok_or(ConfigurationError::MissingField {
            market,
            field: "close_cron",
        })?;

    let timezone = match section.and_then(|s| s.timezone.as_deref()) {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| ConfigurationError::InvalidTimezone {
                market,
                timezone: name.to_string(),
            })?,
        None => market.timezone(),
    };

    let destinations: Vec<DestinationEndpoint> = match section {
        Some(s) if !s.destinations.is_empty() => s.destinations.iter().map(Into::into).collect(),
        _ => config.destinations.iter().map(Into::into).collect(),
    };
    if destinations.is_empty() {
        return Err(ConfigurationError::NoDestinations(market));
    }

    let settings = MarketSettings {
        market,
        open_cron,
        close_cron,
        timezone,
        branding: MarketBranding::from_config(market, section),
        destinations,
    };

    // Parse both expressions now so a bad cron fails startup, not the first tick
    settings.triggers()?;

    Ok(settings)
}

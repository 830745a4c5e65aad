//! Bell Alert Library
//!
//! Sends market-open and closing-briefing notifications for stock indices
//! (SET, NASDAQ Composite) to Discord webhooks, on trading days only.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                       AlertScheduler (cron)                           │
//! │             one trigger per (market, open | briefing)                 │
//! ├───────────────────────────────────────────────────────────────────────┤
//! │                           AlertPipeline                               │
//! │  ┌──────────────┐   ┌──────────────────┐   ┌──────────┐   ┌────────┐ │
//! │  │ TradingDay   │──▶│ MarketData       │──▶│ Alert    │──▶│ Dis-   │ │
//! │  │ Gate         │   │ Provider         │   │ Composer │   │ patcher│ │
//! │  └──────┬───────┘   └──────────────────┘   └──────────┘   └────────┘ │
//! │         │             scrape (SET) / API (NASDAQ)        per-webhook │
//! │   HolidayCalendarSource                                  isolation   │
//! │   BOT (TH) / Nager (US)                                               │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! - A tick is stateless: holidays and the snapshot are fetched fresh every time
//! - Weekends are decided locally; holiday APIs are only called on weekdays
//! - A failing destination never blocks delivery to the others

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod calendar;
pub mod composer;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod market;
pub mod pipeline;
pub mod resilience;
pub mod scheduler;
pub mod settings;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use bell_common::config::Config;

use crate::calendar::{BotHolidaySource, NagerHolidaySource, TradingDayGate};
use crate::composer::AlertComposer;
use crate::data::{NasdaqApiProvider, ProviderRegistry, SetScrapingProvider};
use crate::dispatch::{DiscordWebhookTransport, Dispatcher};
use crate::error::ConfigurationError;
use crate::market::{AlertKind, Market};
use crate::pipeline::{AlertPipeline, TickOutcome};
use crate::resilience::CallPolicy;
use crate::scheduler::AlertScheduler;
use crate::settings::AlertSettings;

/// Build the production pipeline: real holiday APIs, providers and Discord.
pub fn build_pipeline(settings: &AlertSettings) -> AlertPipeline {
    let mut gate = TradingDayGate::new(settings.failure_policy).with_source(Arc::new(
        NagerHolidaySource::from_config(&settings.holidays, &settings.reliability),
    ));
    if let Some(bot) = BotHolidaySource::from_config(&settings.holidays, &settings.reliability) {
        gate = gate.with_source(Arc::new(bot));
    }

    let mut providers = ProviderRegistry::new();
    let mut composer = AlertComposer::new();
    for market in &settings.markets {
        match market.market {
            Market::Set => providers.register(
                Market::Set,
                Arc::new(SetScrapingProvider::from_config(&settings.data_sources, &settings.reliability)),
            ),
            Market::Nasdaq => providers.register(
                Market::Nasdaq,
                Arc::new(NasdaqApiProvider::from_config(&settings.data_sources, &settings.reliability)),
            ),
        }
        composer = composer.with_branding(market.market, market.branding.clone());
    }

    let transport = DiscordWebhookTransport::new(
        settings.discord_api_base.clone(),
        settings.bot_name.clone(),
        settings.request_timeout(),
    );
    let dispatcher = Dispatcher::new(Arc::new(transport), CallPolicy::http(&settings.reliability));

    settings.markets.iter().fold(
        AlertPipeline::new(gate, providers, composer, dispatcher),
        |pipeline, market| pipeline.with_destinations(market.market, market.destinations.clone()),
    )
}

/// Main alert service
pub struct AlertService {
    settings: AlertSettings,
    pipeline: Arc<AlertPipeline>,
}

impl AlertService {
    /// Validate `config` and build the production service.
    pub fn from_config(config: &Config) -> Result<Self, ConfigurationError> {
        let settings = AlertSettings::from_config(config)?;
        let pipeline = build_pipeline(&settings);
        Ok(Self::with_pipeline(settings, pipeline))
    }

    /// Service over an already assembled pipeline.
    pub fn with_pipeline(settings: AlertSettings, pipeline: AlertPipeline) -> Self {
        Self {
            settings,
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    pub fn pipeline(&self) -> &Arc<AlertPipeline> {
        &self.pipeline
    }

    fn ensure_enabled(&self, market: Market) -> Result<(), ConfigurationError> {
        if self.settings.market(market).is_some() && self.pipeline.serves(market) {
            Ok(())
        } else {
            Err(ConfigurationError::MarketNotEnabled(market))
        }
    }

    /// Scheduler over every configured trigger.
    pub fn scheduler(&self) -> Result<AlertScheduler, ConfigurationError> {
        Ok(AlertScheduler::new(self.settings.triggers()?, self.pipeline.clone()))
    }

    /// Run a single tick now. `force` skips the trading-day gate.
    pub async fn run_once(&self, market: Market, kind: AlertKind, force: bool) -> Result<TickOutcome, ConfigurationError> {
        self.ensure_enabled(market)?;
        let now = Utc::now();
        let outcome = if force {
            self.pipeline.run_tick_forced(market, kind, now).await
        } else {
            self.pipeline.run_tick(market, kind, now).await
        };
        Ok(outcome)
    }

    /// Gate decision for `market` at `at`.
    pub async fn check_trading_day(&self, market: Market, at: DateTime<Utc>) -> Result<bool> {
        self.ensure_enabled(market)?;
        Ok(self.pipeline.gate().is_trading_day(market, at).await?)
    }

    /// Run the scheduler until Ctrl-C.
    pub async fn run(&self) -> Result<()> {
        let scheduler = self.scheduler()?;

        for upcoming in scheduler.upcoming(Utc::now()) {
            info!(
                market = %upcoming.market,
                kind = %upcoming.kind,
                at = %upcoming.at,
                "Next alert"
            );
        }

        let handle = scheduler.spawn();
        info!(triggers = handle.len(), "Alert service running, press Ctrl-C to stop");

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;

        info!("Shutdown signal received");
        handle.shutdown();
        Ok(())
    }
}

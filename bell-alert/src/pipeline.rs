//! One alert tick, end to end.
//!
//! ```text
//! Triggered -> GateChecking -> (Skipped | Fetching) -> Composing -> Delivering -> Done
//! ```
//!
//! A tick never panics or propagates an error to its caller: every failure
//! is caught here, logged with the stage it happened in, and returned as
//! [`TickOutcome::Failed`].

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error, info, info_span, warn, Instrument};

use bell_common::logging::generate_trace_id;

use crate::calendar::{local_date, TradingDayGate};
use crate::composer::AlertComposer;
use crate::data::ProviderRegistry;
use crate::dispatch::{DeliveryReport, DestinationEndpoint, Dispatcher};
use crate::error::{MarketDataError, TickError};
use crate::market::{AlertKind, Market};

// ============================================================================
// Tick State
// ============================================================================

/// Where a tick is (or was when it failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickStage {
    Triggered,
    GateChecking,
    Fetching,
    Composing,
    Delivering,
    Done,
}

impl TickStage {
    /// Get stage name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Triggered => "triggered",
            Self::GateChecking => "gate_checking",
            Self::Fetching => "fetching",
            Self::Composing => "composing",
            Self::Delivering => "delivering",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TickStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a tick ended.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Not a trading day; nothing was fetched or sent
    Skipped { date: NaiveDate },
    /// The payload went out; per-destination results are in the report
    Delivered(DeliveryReport),
    /// The tick aborted before delivery
    Failed { stage: TickStage, error: TickError },
}

impl TickOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn report(&self) -> Option<&DeliveryReport> {
        match self {
            Self::Delivered(report) => Some(report),
            _ => None,
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Gate, fetch, compose and deliver for any configured market.
///
/// Holds only immutable state, so one instance is shared by every trigger.
pub struct AlertPipeline {
    gate: TradingDayGate,
    providers: ProviderRegistry,
    composer: AlertComposer,
    dispatcher: Dispatcher,
    destinations: HashMap<Market, Vec<DestinationEndpoint>>,
}

impl AlertPipeline {
    pub fn new(
        gate: TradingDayGate,
        providers: ProviderRegistry,
        composer: AlertComposer,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            gate,
            providers,
            composer,
            dispatcher,
            destinations: HashMap::new(),
        }
    }

    /// Set the ordered destination list for a market.
    pub fn with_destinations(mut self, market: Market, destinations: Vec<DestinationEndpoint>) -> Self {
        self.destinations.insert(market, destinations);
        self
    }

    pub fn gate(&self) -> &TradingDayGate {
        &self.gate
    }

    /// Whether both a holiday source and a provider are wired for `market`.
    pub fn serves(&self, market: Market) -> bool {
        self.gate.covers(market) && self.providers.contains(market)
    }

    pub fn destinations(&self, market: Market) -> &[DestinationEndpoint] {
        self.destinations.get(&market).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Run one tick for `(market, kind)` as of `now`.
    pub async fn run_tick(&self, market: Market, kind: AlertKind, now: DateTime<Utc>) -> TickOutcome {
        self.run(market, kind, now, true).await
    }

    /// Run one tick without consulting the trading-day gate.
    pub async fn run_tick_forced(&self, market: Market, kind: AlertKind, now: DateTime<Utc>) -> TickOutcome {
        self.run(market, kind, now, false).await
    }

    async fn run(&self, market: Market, kind: AlertKind, now: DateTime<Utc>, check_gate: bool) -> TickOutcome {
        let tick_id = generate_trace_id();
        let span = info_span!("tick", tick_id = %tick_id, market = %market, kind = %kind);

        async move {
            info!(stage = %TickStage::Triggered, forced = !check_gate, "Alert tick started");
            let outcome = self.execute(market, kind, now, check_gate).await;

            match &outcome {
                TickOutcome::Skipped { date } => {
                    info!(date = %date, "Not a trading day, alert skipped");
                }
                TickOutcome::Delivered(report) => info!(
                    stage = %TickStage::Done,
                    succeeded = report.succeeded(),
                    failed = report.failed(),
                    "Alert tick finished"
                ),
                TickOutcome::Failed { stage, error } => error!(
                    stage = %stage,
                    error_kind = error.kind(),
                    error = %error,
                    "Alert tick failed"
                ),
            }

            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, market: Market, kind: AlertKind, now: DateTime<Utc>, check_gate: bool) -> TickOutcome {
        if check_gate {
            debug!(stage = %TickStage::GateChecking, "Checking trading day");
            match self.gate.is_trading_day(market, now).await {
                Ok(true) => {}
                Ok(false) => {
                    return TickOutcome::Skipped {
                        date: local_date(market, now),
                    }
                }
                Err(e) => {
                    return TickOutcome::Failed {
                        stage: TickStage::GateChecking,
                        error: e.into(),
                    }
                }
            }
        }

        debug!(stage = %TickStage::Fetching, "Retrieving market snapshot");
        let snapshot = match self.providers.get(market) {
            Some(provider) => provider.get_index_snapshot(market).await,
            None => Err(MarketDataError::UnsupportedMarket {
                provider: "none",
                market,
            }),
        };
        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return TickOutcome::Failed {
                    stage: TickStage::Fetching,
                    error: e.into(),
                }
            }
        };

        debug!(stage = %TickStage::Composing, "Composing payload");
        let payload = self.composer.compose(market, kind, &snapshot, now);

        let destinations = self.destinations(market);
        if destinations.is_empty() {
            warn!("No destinations configured, payload dropped");
        }

        debug!(stage = %TickStage::Delivering, destinations = destinations.len(), "Dispatching");
        TickOutcome::Delivered(self.dispatcher.deliver(&payload, destinations).await)
    }
}

impl fmt::Debug for AlertPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertPipeline")
            .field("gate", &self.gate)
            .field("providers", &self.providers)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(TickStage::GateChecking.to_string(), "gate_checking");
        assert_eq!(TickStage::Done.name(), "done");
    }

    #[test]
    fn test_outcome_helpers() {
        let skipped = TickOutcome::Skipped {
            date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
        };
        assert!(skipped.is_skipped());
        assert!(skipped.report().is_none());

        let delivered = TickOutcome::Delivered(DeliveryReport::default());
        assert!(!delivered.is_failed());
        assert!(delivered.report().is_some());
    }
}

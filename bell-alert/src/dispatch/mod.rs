//! Multi-destination delivery.
//!
//! The [`Dispatcher`] sends one payload to every destination concurrently.
//! Each attempt is independent: a failure at one destination is recorded in
//! the [`DeliveryReport`] and never prevents delivery to the others.

pub mod discord;

use async_trait::async_trait;
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use bell_common::DestinationConfig;

use crate::composer::AlertPayload;
use crate::error::DeliveryError;
use crate::resilience::{call_with_policy, CallPolicy};

pub use discord::DiscordWebhookTransport;

// ============================================================================
// Destination
// ============================================================================

/// A webhook destination: id plus secret token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DestinationEndpoint {
    pub id: String,
    pub token: String,
}

impl DestinationEndpoint {
    pub fn new(id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            token: token.into(),
        }
    }
}

impl From<&DestinationConfig> for DestinationEndpoint {
    fn from(config: &DestinationConfig) -> Self {
        Self::new(config.id.clone(), config.token.clone())
    }
}

impl fmt::Debug for DestinationEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationEndpoint")
            .field("id", &self.id)
            .field("token", &"***")
            .finish()
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Delivers a payload to a single destination.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Transport name for logging
    fn name(&self) -> &'static str;

    /// Send `payload` to `destination`.
    async fn send(&self, payload: &AlertPayload, destination: &DestinationEndpoint) -> Result<(), DeliveryError>;
}

// ============================================================================
// Report
// ============================================================================

/// Result of delivering to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub destination_id: String,
    pub result: Result<(), DeliveryError>,
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-destination outcomes of one dispatch, in destination order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DeliveryReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// Failed outcomes only.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &DeliveryError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.destination_id.as_str(), e)))
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Fans a payload out to every destination over one transport.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn DeliveryTransport>,
    policy: CallPolicy,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn DeliveryTransport>, policy: CallPolicy) -> Self {
        Self { transport, policy }
    }

    async fn deliver_one(&self, payload: &AlertPayload, destination: &DestinationEndpoint) -> DeliveryOutcome {
        let result = call_with_policy(
            &self.policy,
            self.transport.name(),
            || DeliveryError::Timeout,
            || self.transport.send(payload, destination),
        )
        .await;

        match &result {
            Ok(()) => info!(
                market = %payload.market,
                kind = %payload.kind,
                destination = %destination.id,
                transport = self.transport.name(),
                "Alert delivered"
            ),
            Err(e) => warn!(
                market = %payload.market,
                kind = %payload.kind,
                destination = %destination.id,
                transport = self.transport.name(),
                error = %e,
                "Alert delivery failed"
            ),
        }

        DeliveryOutcome {
            destination_id: destination.id.clone(),
            result,
        }
    }

    /// Deliver `payload` to every destination concurrently.
    ///
    /// Always returns a report with one outcome per destination.
    pub async fn deliver(&self, payload: &AlertPayload, destinations: &[DestinationEndpoint]) -> DeliveryReport {
        let attempts = destinations.iter().map(|d| self.deliver_one(payload, d));
        let outcomes = join_all(attempts).await;

        let report = DeliveryReport { outcomes };
        info!(
            market = %payload.market,
            kind = %payload.kind,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Dispatch complete"
        );
        report
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("transport", &self.transport.name())
            .field("policy", &self.policy)
            .finish()
    }
}

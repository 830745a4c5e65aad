//! Market data provider abstraction.
//!
//! Defines the `MarketDataProvider` trait implemented by every snapshot
//! source. Each market is bound to exactly one provider when the service is
//! built; there is no failover between providers.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::MarketDataError;
use crate::market::{Market, MarketIndexSnapshot};

// ============================================================================
// Provider Trait
// ============================================================================

/// A source of index snapshots.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Retrieve the current snapshot for `market`.
    ///
    /// Either every required field is present and parsed, or an error is
    /// returned. Partial snapshots are never produced.
    async fn get_index_snapshot(&self, market: Market) -> Result<MarketIndexSnapshot, MarketDataError>;
}

/// Shared provider handle.
pub type SharedProvider = Arc<dyn MarketDataProvider>;

/// Reject a market the provider does not serve.
pub fn ensure_market(
    provider: &'static str,
    served: Market,
    requested: Market,
) -> Result<(), MarketDataError> {
    if served == requested {
        Ok(())
    } else {
        Err(MarketDataError::UnsupportedMarket {
            provider,
            market: requested,
        })
    }
}

// ============================================================================
// Provider Registry
// ============================================================================

/// Market → provider binding.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Market, SharedProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `provider` to `market`, replacing any earlier binding.
    pub fn register(&mut self, market: Market, provider: SharedProvider) {
        tracing::debug!(market = %market, provider = provider.name(), "Bound market data provider");
        self.providers.insert(market, provider);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, market: Market, provider: SharedProvider) -> Self {
        self.register(market, provider);
        self
    }

    /// Provider bound to `market`, if any.
    pub fn get(&self, market: Market) -> Option<&SharedProvider> {
        self.providers.get(&market)
    }

    pub fn contains(&self, market: Market) -> bool {
        self.providers.contains_key(&market)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut bindings: Vec<_> = self
            .providers
            .iter()
            .map(|(market, provider)| (market.code(), provider.name()))
            .collect();
        bindings.sort();
        f.debug_struct("ProviderRegistry")
            .field("bindings", &bindings)
            .finish()
    }
}

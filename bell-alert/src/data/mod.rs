//! Market data retrieval.
//!
//! Two strategies sit behind the same [`MarketDataProvider`] trait:
//! - `scraper`: headless-browser scrape of the Settrade home page (SET)
//! - `nasdaq`: the NASDAQ quote JSON API (NASDAQ Composite)
//!
//! Both normalize display text into numbers through [`parse`].

pub mod nasdaq;
pub mod parse;
pub mod provider;
pub mod scraper;

pub use nasdaq::NasdaqApiProvider;
pub use provider::{ensure_market, MarketDataProvider, ProviderRegistry, SharedProvider};
pub use scraper::{
    extract_set_snapshot, ChromiumPageFetcher, FieldSelector, PageFetcher, SetScrapingProvider,
};

//! Scraping strategy for the SET index.
//!
//! The Settrade home page renders its index summary client-side, so the page
//! is loaded in headless Chromium (`chromiumoxide`) and the rendered DOM is
//! handed to a pure extraction step built on `scraper` CSS selectors.
//!
//! A missing element is reported as [`ScrapeError`] (page layout changed),
//! distinct from network, timeout and browser failures.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use scraper::{Html, Selector};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use bell_common::{DataSourcesConfig, ReliabilityConfig};

use super::parse::{parse_number, parse_percent};
use super::provider::{ensure_market, MarketDataProvider};
use crate::error::{MarketDataError, ScrapeError};
use crate::market::{Market, MarketIndexSnapshot};
use crate::resilience::{call_with_policy, CallPolicy};

// ============================================================================
// Selectors
// ============================================================================

/// Prefix every selector with the SET detail pane container.
macro_rules! set_pane {
    ($rest:literal) => {
        concat!(
            "#index-set-stock-detail-tab-pane-1 > div > div:nth-of-type(1) > div:nth-of-type(1) > ",
            $rest
        )
    };
}

/// A snapshot field and where it lives on the page.
#[derive(Debug, Clone, Copy)]
pub struct FieldSelector {
    pub field: &'static str,
    pub css: &'static str,
}

pub const SET_INDEX: FieldSelector = FieldSelector {
    field: "index",
    css: set_pane!("div:nth-of-type(1) > div:nth-of-type(2) > div > div > div:nth-of-type(2) > div:nth-of-type(1) > h2"),
};

pub const SET_CHANGE: FieldSelector = FieldSelector {
    field: "change",
    css: set_pane!("div:nth-of-type(1) > div:nth-of-type(2) > div > div > div:nth-of-type(2) > div:nth-of-type(2) > span:nth-of-type(1)"),
};

pub const SET_PERCENT_CHANGE: FieldSelector = FieldSelector {
    field: "percent_change",
    css: set_pane!("div:nth-of-type(1) > div:nth-of-type(2) > div > div > div:nth-of-type(2) > div:nth-of-type(2) > span:nth-of-type(2)"),
};

pub const SET_HIGH: FieldSelector = FieldSelector {
    field: "high",
    css: set_pane!("div:nth-of-type(2) > div:nth-of-type(1) > div:nth-of-type(1) > span"),
};

pub const SET_LOW: FieldSelector = FieldSelector {
    field: "low",
    css: set_pane!("div:nth-of-type(2) > div:nth-of-type(2) > div:nth-of-type(1) > span"),
};

pub const SET_VOLUME: FieldSelector = FieldSelector {
    field: "volume",
    css: set_pane!("div:nth-of-type(2) > div:nth-of-type(1) > div:nth-of-type(2) > span"),
};

pub const SET_VALUE: FieldSelector = FieldSelector {
    field: "value",
    css: set_pane!("div:nth-of-type(2) > div:nth-of-type(2) > div:nth-of-type(2) > span"),
};

// ============================================================================
// Extraction
// ============================================================================

/// Read the trimmed text of the first element matching `selector`.
fn select_text(document: &Html, selector: FieldSelector, url: &str) -> Result<String, MarketDataError> {
    let parsed = Selector::parse(selector.css).map_err(|e| {
        MarketDataError::Malformed(format!("invalid selector for {}: {}", selector.field, e))
    })?;

    let element = document.select(&parsed).next().ok_or_else(|| ScrapeError {
        field: selector.field,
        selector: selector.css.to_string(),
        url: url.to_string(),
    })?;

    Ok(element.text().collect::<String>().trim().to_string())
}

/// Extract a SET snapshot from rendered page HTML.
///
/// Pure function; all browser work happens before this is called.
pub fn extract_set_snapshot(html: &str, url: &str) -> Result<MarketIndexSnapshot, MarketDataError> {
    let document = Html::parse_document(html);
    let number = |selector: FieldSelector| -> Result<f64, MarketDataError> {
        parse_number(selector.field, &select_text(&document, selector, url)?)
    };

    let snapshot = MarketIndexSnapshot {
        market: Market::Set,
        index: number(SET_INDEX)?,
        change: number(SET_CHANGE)?,
        percent_change: parse_percent(
            SET_PERCENT_CHANGE.field,
            &select_text(&document, SET_PERCENT_CHANGE, url)?,
        )?,
        high: number(SET_HIGH)?,
        low: number(SET_LOW)?,
        volume: Some(number(SET_VOLUME)?),
        value: Some(number(SET_VALUE)?),
    };

    debug!(
        index = snapshot.index,
        change = snapshot.change,
        percent_change = snapshot.percent_change,
        high = snapshot.high,
        low = snapshot.low,
        "Extracted SET snapshot"
    );

    Ok(snapshot)
}

// ============================================================================
// Page Fetching
// ============================================================================

/// Renders a page and returns its HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Load `url`, wait (best effort) for `ready_selector`, return the DOM.
    async fn fetch_rendered(&self, url: &str, ready_selector: &str) -> Result<String, MarketDataError>;
}

/// Interval between checks for the ready element.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Headless Chromium page fetcher.
///
/// A fresh browser is launched per fetch and closed afterwards; ticks are
/// minutes apart, so there is nothing worth keeping warm.
pub struct ChromiumPageFetcher {
    chrome_executable: Option<PathBuf>,
    request_timeout: Duration,
    ready_timeout: Duration,
}

impl ChromiumPageFetcher {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            chrome_executable: None,
            request_timeout,
            ready_timeout: request_timeout / 2,
        }
    }

    /// Use an explicit Chrome/Chromium binary instead of auto-detection.
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_executable = Some(path.into());
        self
    }

    fn browser_config(&self) -> Result<BrowserConfig, MarketDataError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-gpu")
            .request_timeout(self.request_timeout);

        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(MarketDataError::Browser)
    }

    fn map_cdp(&self, err: CdpError) -> MarketDataError {
        match err {
            CdpError::Timeout => MarketDataError::Timeout {
                secs: self.request_timeout.as_secs(),
            },
            other => MarketDataError::Network(other.to_string()),
        }
    }

    async fn render(&self, browser: &Browser, url: &str, ready_selector: &str) -> Result<String, MarketDataError> {
        let page = browser.new_page(url).await.map_err(|e| self.map_cdp(e))?;
        page.wait_for_navigation().await.map_err(|e| self.map_cdp(e))?;

        let deadline = Instant::now() + self.ready_timeout;
        loop {
            match page.find_element(ready_selector).await {
                Ok(_) => break,
                Err(_) if Instant::now() < deadline => tokio::time::sleep(READY_POLL_INTERVAL).await,
                Err(_) => {
                    // Extraction reports exactly which element is missing
                    warn!(url = %url, "Ready element did not appear, extracting anyway");
                    break;
                }
            }
        }

        page.content()
            .await
            .map_err(|e| MarketDataError::Browser(e.to_string()))
    }
}

#[async_trait]
impl PageFetcher for ChromiumPageFetcher {
    async fn fetch_rendered(&self, url: &str, ready_selector: &str) -> Result<String, MarketDataError> {
        let config = self.browser_config()?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| MarketDataError::Browser(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        debug!(url = %url, "Rendering page");
        let result = self.render(&browser, url, ready_selector).await;

        if let Err(e) = browser.close().await {
            debug!(error = %e, "Failed to close browser cleanly");
        }
        let _ = browser.wait().await;
        handler_task.abort();

        result
    }
}

// ============================================================================
// SET Provider
// ============================================================================

/// Scraping-based snapshot provider for the SET index.
pub struct SetScrapingProvider {
    url: String,
    fetcher: Arc<dyn PageFetcher>,
    policy: CallPolicy,
}

impl SetScrapingProvider {
    pub fn new(url: impl Into<String>, fetcher: Arc<dyn PageFetcher>, policy: CallPolicy) -> Self {
        Self {
            url: url.into(),
            fetcher,
            policy,
        }
    }

    /// Create from config, backed by headless Chromium.
    pub fn from_config(sources: &DataSourcesConfig, reliability: &ReliabilityConfig) -> Self {
        let policy = CallPolicy::browser(reliability);
        let mut fetcher = ChromiumPageFetcher::new(policy.timeout);
        if let Some(path) = &sources.chrome_executable {
            fetcher = fetcher.with_executable(path);
        }
        Self::new(sources.settrade_url.clone(), Arc::new(fetcher), policy)
    }
}

#[async_trait]
impl MarketDataProvider for SetScrapingProvider {
    fn name(&self) -> &'static str {
        "settrade_scraper"
    }

    async fn get_index_snapshot(&self, market: Market) -> Result<MarketIndexSnapshot, MarketDataError> {
        ensure_market(self.name(), Market::Set, market)?;

        info!(url = %self.url, "Scraping SET index");
        let timeout_secs = self.policy.timeout.as_secs();
        let html = call_with_policy(
            &self.policy,
            self.name(),
            || MarketDataError::Timeout { secs: timeout_secs },
            || self.fetcher.fetch_rendered(&self.url, SET_INDEX.css),
        )
        .await?;

        extract_set_snapshot(&html, &self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const URL: &str = "https://www.settrade.com/th/home";

    fn fixture(index: &str, change: &str, percent: &str) -> String {
        format!(
            r#"<html><body>
            <div id="index-set-stock-detail-tab-pane-1"><div><div><div>
              <div>
                <div>SET</div>
                <div><div><div>
                  <div><img src="logo.png"></div>
                  <div>
                    <div>{index}</div>
                    <div><span>{change}</span><span>{percent}</span></div>
                  </div>
                </div></div></div>
              </div>
              <div>
                <div>
                  <div><label>High</label><span>1,320.10</span></div>
                  <div><label>Volume</label><span>12,345,678</span></div>
                </div>
                <div>
                  <div><label>Low</label><span>1,305.22</span></div>
                  <div><label>Value</label><span>45,678.90</span></div>
                </div>
              </div>
            </div></div></div></div>
            </body></html>"#
        )
    }

    #[test]
    fn test_extract_full_snapshot() {
        let html = fixture("<h2>1,312.45</h2>", "-5.40", "(-0.41%)");
        let snapshot = extract_set_snapshot(&html, URL).unwrap();

        assert_eq!(snapshot.market, Market::Set);
        assert_eq!(snapshot.index, 1312.45);
        assert_eq!(snapshot.change, -5.4);
        assert_eq!(snapshot.percent_change, -0.41);
        assert_eq!(snapshot.high, 1320.10);
        assert_eq!(snapshot.low, 1305.22);
        assert_eq!(snapshot.volume, Some(12_345_678.0));
        assert_eq!(snapshot.value, Some(45_678.90));
    }

    #[test]
    fn test_missing_element_is_scrape_error() {
        let html = fixture("<p>1,312.45</p>", "-5.40", "(-0.41%)");
        let err = extract_set_snapshot(&html, URL).unwrap_err();

        match err {
            MarketDataError::Scrape(scrape) => {
                assert_eq!(scrape.field, "index");
                assert_eq!(scrape.url, URL);
                assert!(scrape.selector.ends_with("> h2"));
            }
            other => panic!("expected scrape error, got {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_text_is_parse_error() {
        let html = fixture("<h2>1,312.45</h2>", "--", "(-0.41%)");
        let err = extract_set_snapshot(&html, URL).unwrap_err();
        assert!(matches!(err, MarketDataError::Parse { field: "change", .. }));
    }

    #[test]
    fn test_all_selectors_are_valid_css() {
        for selector in [
            SET_INDEX,
            SET_CHANGE,
            SET_PERCENT_CHANGE,
            SET_HIGH,
            SET_LOW,
            SET_VOLUME,
            SET_VALUE,
        ] {
            assert!(Selector::parse(selector.css).is_ok(), "{}", selector.field);
        }
    }

    struct StaticFetcher {
        html: String,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch_rendered(&self, url: &str, ready_selector: &str) -> Result<String, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(url, URL);
            assert_eq!(ready_selector, SET_INDEX.css);
            Ok(self.html.clone())
        }
    }

    #[tokio::test]
    async fn test_provider_uses_fetcher() {
        let fetcher = Arc::new(StaticFetcher {
            html: fixture("<h2>1,400.00</h2>", "+2.00", "(+0.14%)"),
            calls: AtomicU32::new(0),
        });
        let provider = SetScrapingProvider::new(URL, fetcher.clone(), CallPolicy::once(Duration::from_secs(5)));

        let snapshot = provider.get_index_snapshot(Market::Set).await.unwrap();
        assert_eq!(snapshot.index, 1400.0);
        assert_eq!(snapshot.percent_change, 0.14);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let err = provider.get_index_snapshot(Market::Nasdaq).await.unwrap_err();
        assert!(matches!(err, MarketDataError::UnsupportedMarket { .. }));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}

//! NASDAQ quote adapter against a mock HTTP server.

use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bell_alert::data::{MarketDataProvider, NasdaqApiProvider};
use bell_alert::error::MarketDataError;
use bell_alert::market::Market;
use bell_alert::resilience::CallPolicy;

fn provider(server: &MockServer) -> NasdaqApiProvider {
    NasdaqApiProvider::new(server.uri(), "bell-test/1.0", CallPolicy::once(Duration::from_secs(5)))
}

fn quote_body() -> serde_json::Value {
    serde_json::json!({
        "data": {
            "symbol": "COMP",
            "primaryData": {
                "lastSalePrice": "$17,754.09",
                "netChange": "+58.21",
                "percentageChange": "+0.33%"
            },
            "keyStats": {
                "dayrange": { "label": "Day Range", "value": "17,600.12 - 17,801.55" }
            }
        }
    })
}

#[tokio::test]
async fn test_fetches_composite_quote() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/quote/COMP/info"))
        .and(query_param("assetclass", "index"))
        .and(header("user-agent", "bell-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quote_body()))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = provider(&server).get_index_snapshot(Market::Nasdaq).await.unwrap();

    assert_eq!(snapshot.market, Market::Nasdaq);
    assert_eq!(snapshot.index, 17754.09);
    assert_eq!(snapshot.change, 58.21);
    assert_eq!(snapshot.percent_change, 0.33);
    assert_eq!(snapshot.low, 17600.12);
    assert_eq!(snapshot.high, 17801.55);
}

#[tokio::test]
async fn test_http_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = provider(&server).get_index_snapshot(Market::Nasdaq).await.unwrap_err();

    assert!(matches!(err, MarketDataError::Http { status: 503 }));
    assert!(err.is_transient());
    assert!(!err.is_scrape());
}

#[tokio::test]
async fn test_missing_data_section() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": null,
            "message": "Symbol not exists"
        })))
        .mount(&server)
        .await;

    let err = provider(&server).get_index_snapshot(Market::Nasdaq).await.unwrap_err();

    assert!(matches!(err, MarketDataError::Malformed(_)));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(quote_body())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let provider = NasdaqApiProvider::new(server.uri(), "bell-test/1.0", CallPolicy::once(Duration::from_millis(200)));
    let err = provider.get_index_snapshot(Market::Nasdaq).await.unwrap_err();

    assert!(matches!(err, MarketDataError::Timeout { .. }));
}

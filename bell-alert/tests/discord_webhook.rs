//! Discord webhook transport and dispatcher fan-out against a mock server.

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bell_alert::composer::{AlertComposer, AlertPayload};
use bell_alert::dispatch::{DeliveryTransport, DestinationEndpoint, DiscordWebhookTransport, Dispatcher};
use bell_alert::error::DeliveryError;
use bell_alert::market::{AlertKind, Market, MarketIndexSnapshot};
use bell_alert::resilience::CallPolicy;

fn payload() -> AlertPayload {
    let snapshot = MarketIndexSnapshot {
        market: Market::Nasdaq,
        index: 17754.09,
        change: -23.45,
        percent_change: -0.13,
        high: 17801.55,
        low: 17600.12,
        volume: None,
        value: None,
    };
    let at = Utc.with_ymd_and_hms(2024, 6, 11, 13, 35, 0).unwrap();
    AlertComposer::new().compose(Market::Nasdaq, AlertKind::MarketOpen, &snapshot, at)
}

fn transport(server: &MockServer) -> DiscordWebhookTransport {
    DiscordWebhookTransport::new(server.uri(), "Opening Bell", Duration::from_secs(5))
}

#[tokio::test]
async fn test_posts_embed_to_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/webhooks/111/secret"))
        .and(body_partial_json(serde_json::json!({
            "username": "Opening Bell",
            "embeds": [{
                "title": "รายงานสถานการณ์ NASDAQ Composite Index",
                "color": 0x0679a1
            }]
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let result = transport(&server)
        .send(&payload(), &DestinationEndpoint::new("111", "secret"))
        .await;

    assert_ok!(result);
}

#[tokio::test]
async fn test_rejected_token_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"message": "Invalid Webhook Token"}"#))
        .mount(&server)
        .await;

    let err = assert_err!(
        transport(&server)
            .send(&payload(), &DestinationEndpoint::new("111", "wrong"))
            .await
    );

    assert_eq!(err, DeliveryError::Auth { status: 401 });
}

#[tokio::test]
async fn test_rate_limited_reads_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1.5"))
        .mount(&server)
        .await;

    let err = assert_err!(
        transport(&server)
            .send(&payload(), &DestinationEndpoint::new("111", "secret"))
            .await
    );

    assert_eq!(
        err,
        DeliveryError::RateLimited {
            retry_after_secs: Some(2)
        }
    );
}

#[tokio::test]
async fn test_server_error_keeps_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = assert_err!(
        transport(&server)
            .send(&payload(), &DestinationEndpoint::new("111", "secret"))
            .await
    );

    assert_eq!(
        err,
        DeliveryError::Http {
            status: 502,
            body: "bad gateway".into()
        }
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_dispatcher_isolates_failing_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/webhooks/good/token-a"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/webhooks/gone/token-b"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/webhooks/also-good/token-c"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(Arc::new(transport(&server)), CallPolicy::once(Duration::from_secs(5)));
    let destinations = vec![
        DestinationEndpoint::new("good", "token-a"),
        DestinationEndpoint::new("gone", "token-b"),
        DestinationEndpoint::new("also-good", "token-c"),
    ];

    let report = dispatcher.deliver(&payload(), &destinations).await;

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.succeeded(), 2);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures, vec![("gone", &DeliveryError::Auth { status: 404 })]);
}

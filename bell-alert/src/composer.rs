//! Alert payload composition.
//!
//! Turns a [`MarketIndexSnapshot`] into a transport-agnostic [`AlertPayload`].
//! Composition is pure: the same inputs always produce the same payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use bell_common::MarketConfig;

use crate::market::{AlertKind, Market, MarketIndexSnapshot};

// ============================================================================
// Payload
// ============================================================================

/// A single labelled value in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl PayloadField {
    fn inline(name: &str, value: String) -> Self {
        Self {
            name: name.to_string(),
            value,
            inline: true,
        }
    }
}

/// Structured notification content, independent of any transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub market: Market,
    pub kind: AlertKind,
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub accent_color: u32,
    pub fields: Vec<PayloadField>,
    pub thumbnail_url: Option<String>,
    pub image_url: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub source_attribution: String,
}

// ============================================================================
// Branding
// ============================================================================

/// Display metadata attached to every payload for a market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketBranding {
    pub url: Option<String>,
    pub icon_url: Option<String>,
    pub banner_url: Option<String>,
    pub accent_color: u32,
    pub attribution: String,
}

impl MarketBranding {
    /// Built-in branding for `market`.
    pub fn default_for(market: Market) -> Self {
        match market {
            Market::Set => Self {
                url: Some("https://www.settrade.com/th/home".into()),
                icon_url: None,
                banner_url: None,
                accent_color: 0xfbb034,
                attribution: "settrade.com".into(),
            },
            Market::Nasdaq => Self {
                url: Some("https://www.nasdaq.com/market-activity/index/comp".into()),
                icon_url: None,
                banner_url: None,
                accent_color: 0x0679a1,
                attribution: "nasdaq.com".into(),
            },
        }
    }

    /// Built-in branding with any values set in the market's config section.
    pub fn from_config(market: Market, config: Option<&MarketConfig>) -> Self {
        let mut branding = Self::default_for(market);
        if let Some(config) = config {
            if config.url.is_some() {
                branding.url = config.url.clone();
            }
            if config.icon_url.is_some() {
                branding.icon_url = config.icon_url.clone();
            }
            if config.banner_url.is_some() {
                branding.banner_url = config.banner_url.clone();
            }
        }
        branding
    }
}

// ============================================================================
// Templates
// ============================================================================

/// Title for a (market, kind) pair.
pub fn title_for(market: Market, kind: AlertKind) -> &'static str {
    match (market, kind) {
        (Market::Set, AlertKind::MarketOpen) => "รายงานสถานการณ์ตลาดหลักทรัพย์แห่งประเทศไทย",
        (Market::Set, AlertKind::MarketBriefing) => "สรุปภาวะตลาดหลักทรัพย์แห่งประเทศไทย",
        (Market::Nasdaq, AlertKind::MarketOpen) => "รายงานสถานการณ์ NASDAQ Composite Index",
        (Market::Nasdaq, AlertKind::MarketBriefing) => "สรุปภาวะ NASDAQ Composite Index",
    }
}

/// Index display name used in the description.
pub fn index_label(market: Market) -> &'static str {
    match market {
        Market::Set => "SET Index",
        Market::Nasdaq => "NASDAQ Composite Index (COMP)",
    }
}

const FIELD_CHANGE: &str = ":chart_with_upwards_trend: เปลี่ยนแปลง";
const FIELD_HIGH: &str = ":green_square: สูงสุด";
const FIELD_LOW: &str = ":red_square: ต่ำสุด";
const FIELD_VOLUME: &str = ":coin: ปริมาณ ('000 หุ้น)";
const FIELD_VALUE: &str = ":dollar: มูลค่า (ล้านบาท)";

// ============================================================================
// Number Formatting
// ============================================================================

/// Format with thousands separators and a fixed number of decimals.
pub fn format_number(value: f64, decimals: usize) -> String {
    let rounded = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match rounded.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (rounded.as_str(), None),
    };

    let mut out = String::with_capacity(rounded.len() + int_part.len() / 3 + 1);
    if value < 0.0 && !is_zero_text(&rounded) {
        out.push('-');
    }
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Like [`format_number`] but always carries an explicit sign for non-zero values.
pub fn format_signed(value: f64, decimals: usize) -> String {
    let formatted = format_number(value, decimals);
    if value > 0.0 && !is_zero_text(&formatted) {
        format!("+{}", formatted)
    } else {
        formatted
    }
}

fn is_zero_text(text: &str) -> bool {
    text.chars().all(|c| matches!(c, '0' | '.' | ',' | '-'))
}

// ============================================================================
// Composer
// ============================================================================

/// Builds payloads from snapshots using per-market branding.
#[derive(Debug, Clone)]
pub struct AlertComposer {
    branding: HashMap<Market, MarketBranding>,
}

impl Default for AlertComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertComposer {
    /// Composer with built-in branding for every market.
    pub fn new() -> Self {
        let branding = Market::ALL
            .iter()
            .map(|m| (*m, MarketBranding::default_for(*m)))
            .collect();
        Self { branding }
    }

    /// Override the branding of one market.
    pub fn with_branding(mut self, market: Market, branding: MarketBranding) -> Self {
        self.branding.insert(market, branding);
        self
    }

    pub fn branding(&self, market: Market) -> MarketBranding {
        self.branding
            .get(&market)
            .cloned()
            .unwrap_or_else(|| MarketBranding::default_for(market))
    }

    /// Compose a payload. Pure; the timestamp is supplied by the caller.
    pub fn compose(
        &self,
        market: Market,
        kind: AlertKind,
        snapshot: &MarketIndexSnapshot,
        generated_at: DateTime<Utc>,
    ) -> AlertPayload {
        let branding = self.branding(market);

        let mut fields = vec![
            PayloadField::inline(
                FIELD_CHANGE,
                format!(
                    "{} ({}%)",
                    format_signed(snapshot.change, 2),
                    format_signed(snapshot.percent_change, 2)
                ),
            ),
            PayloadField::inline(FIELD_HIGH, format_number(snapshot.high, 2)),
            PayloadField::inline(FIELD_LOW, format_number(snapshot.low, 2)),
        ];

        // Only markets that publish volume/value get those fields
        if let Some(volume) = snapshot.volume {
            fields.push(PayloadField::inline(FIELD_VOLUME, format_number(volume, 0)));
        }
        if let Some(value) = snapshot.value {
            fields.push(PayloadField::inline(FIELD_VALUE, format_number(value, 2)));
        }

        AlertPayload {
            market,
            kind,
            title: title_for(market, kind).to_string(),
            description: format!("{}\n{}", index_label(market), format_number(snapshot.index, 2)),
            url: branding.url,
            accent_color: branding.accent_color,
            fields,
            thumbnail_url: branding.icon_url,
            image_url: branding.banner_url,
            generated_at,
            source_attribution: branding.attribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn set_snapshot() -> MarketIndexSnapshot {
        MarketIndexSnapshot {
            market: Market::Set,
            index: 1312.45,
            change: -5.4,
            percent_change: -0.41,
            high: 1320.1,
            low: 1305.22,
            volume: Some(12_345_678.0),
            value: Some(45_678.9),
        }
    }

    fn nasdaq_snapshot() -> MarketIndexSnapshot {
        MarketIndexSnapshot {
            market: Market::Nasdaq,
            index: 17754.09,
            change: 23.45,
            percent_change: 0.13,
            high: 17801.55,
            low: 17600.12,
            volume: None,
            value: None,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 11, 3, 0, 0).unwrap()
    }

    #[test]
    fn test_compose_is_deterministic() {
        let composer = AlertComposer::new();
        let a = composer.compose(Market::Set, AlertKind::MarketOpen, &set_snapshot(), at());
        let b = composer.compose(Market::Set, AlertKind::MarketOpen, &set_snapshot(), at());
        assert_eq!(a, b);
    }

    #[test]
    fn test_compose_set_payload() {
        let payload = AlertComposer::new().compose(Market::Set, AlertKind::MarketBriefing, &set_snapshot(), at());

        assert_eq!(payload.title, "สรุปภาวะตลาดหลักทรัพย์แห่งประเทศไทย");
        assert_eq!(payload.description, "SET Index\n1,312.45");
        assert_eq!(payload.accent_color, 0xfbb034);
        assert_eq!(payload.source_attribution, "settrade.com");
        assert_eq!(payload.fields.len(), 5);
        assert_eq!(payload.fields[0].value, "-5.40 (-0.41%)");
        assert_eq!(payload.fields[3].value, "12,345,678");
        assert_eq!(payload.fields[4].value, "45,678.90");
        assert_eq!(payload.generated_at, at());
    }

    #[test]
    fn test_compose_omits_missing_optional_fields() {
        let payload = AlertComposer::new().compose(Market::Nasdaq, AlertKind::MarketOpen, &nasdaq_snapshot(), at());

        assert_eq!(payload.title, "รายงานสถานการณ์ NASDAQ Composite Index");
        assert_eq!(payload.fields.len(), 3);
        assert_eq!(payload.fields[0].value, "+23.45 (+0.13%)");
        assert!(payload.fields.iter().all(|f| !f.name.contains("coin")));
    }

    #[test]
    fn test_branding_overrides() {
        let config = MarketConfig {
            icon_url: Some("https://cdn.example.com/set.png".into()),
            ..Default::default()
        };
        let composer = AlertComposer::new().with_branding(Market::Set, MarketBranding::from_config(Market::Set, Some(&config)));
        let payload = composer.compose(Market::Set, AlertKind::MarketOpen, &set_snapshot(), at());

        assert_eq!(payload.thumbnail_url.as_deref(), Some("https://cdn.example.com/set.png"));
        assert_eq!(payload.url.as_deref(), Some("https://www.settrade.com/th/home"));
        assert!(payload.image_url.is_none());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(999.0, 0), "999");
        assert_eq!(format_number(-1000.5, 1), "-1,000.5");
        assert_eq!(format_number(-0.001, 2), "0.00");
        assert_eq!(format_signed(0.0, 2), "0.00");
        assert_eq!(format_signed(5.4, 2), "+5.40");
    }
}

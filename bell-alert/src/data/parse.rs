//! Numeric normalization for scraped and API-provided strings.
//!
//! Sources publish numbers as display text: `"1,234.56"`, `"$17,754.09"`,
//! `"+1.23%"`, `"(2.5%)"`, `"−12.30"` (unicode minus). Everything here turns
//! such text into `f64` or fails with [`MarketDataError::Parse`].

use crate::error::MarketDataError;

/// Characters that carry no numeric meaning.
fn is_noise(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '$' | '\u{00a0}' | '\u{202f}')
}

/// Strip separators and normalize sign characters.
fn clean(raw: &str) -> String {
    raw.chars()
        .filter(|c| !is_noise(*c))
        .map(|c| match c {
            '\u{2212}' | '\u{2013}' => '-',
            other => other,
        })
        .collect()
}

/// Parse already-cleaned text, honouring accounting-style parentheses.
///
/// `"(2.5)"` is negative, `"(+2.5)"` and `"(-2.5)"` keep their explicit sign.
fn parse_signed(field: &'static str, raw: &str, cleaned: &str) -> Result<f64, MarketDataError> {
    let parse_err = || MarketDataError::Parse {
        field,
        raw: raw.to_string(),
    };

    let (body, parenthesized) = match cleaned
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        Some(inner) => (inner, true),
        None => (cleaned, false),
    };

    if body.is_empty() {
        return Err(parse_err());
    }

    let explicit_sign = body.starts_with('+') || body.starts_with('-');
    let value: f64 = body.parse().map_err(|_| parse_err())?;

    if !value.is_finite() {
        return Err(parse_err());
    }

    if parenthesized && !explicit_sign {
        Ok(-value)
    } else {
        Ok(value)
    }
}

/// Parse a plain number such as an index level, change or volume.
pub fn parse_number(field: &'static str, raw: &str) -> Result<f64, MarketDataError> {
    let cleaned = clean(raw);
    parse_signed(field, raw, &cleaned)
}

/// Parse a percentage, returning the value in percent units (`"+1.23%"` → `1.23`).
pub fn parse_percent(field: &'static str, raw: &str) -> Result<f64, MarketDataError> {
    let cleaned: String = clean(raw).chars().filter(|c| *c != '%').collect();
    parse_signed(field, raw, &cleaned)
}

/// Parse a `"low - high"` range string (as published by the NASDAQ quote API).
pub fn parse_range(field: &'static str, raw: &str) -> Result<(f64, f64), MarketDataError> {
    let parse_err = || MarketDataError::Parse {
        field,
        raw: raw.to_string(),
    };

    // Split on the separator with surrounding spaces so negative bounds survive
    let (low, high) = raw.split_once(" - ").ok_or_else(parse_err)?;
    let low = parse_number(field, low).map_err(|_| parse_err())?;
    let high = parse_number(field, high).map_err(|_| parse_err())?;
    Ok((low, high))
}

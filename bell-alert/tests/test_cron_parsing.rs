use bell_alert::scheduler::{normalize_cron_expression, parse_schedule};
use chrono::{Datelike, TimeZone, Utc, Weekday};

#[test]
fn test_cron_expressions() {
    // Market open: "0 10 * * 1-5" -> "0 0 10 * * 2-6"
    let open_exp = "0 10 * * 1-5";
    let normalized = normalize_cron_expression(open_exp);
    println!("Testing open: '{}' -> '{}'", open_exp, normalized);
    assert_eq!(normalized, "0 0 10 * * 2-6");
    assert!(parse_schedule(open_exp).is_ok(), "Open expression should be valid");

    // Sunday as 0: "0 20 * * 0"
    let sunday_exp = "0 20 * * 0";
    let result = parse_schedule(sunday_exp);
    if let Err(e) = &result {
        println!("Error: {}", e);
    }
    assert!(result.is_ok(), "Sunday expression should be valid");

    // Day names pass through unchanged
    assert!(parse_schedule("45 16 * * MON-FRI").is_ok(), "Named weekdays should be valid");
    assert!(parse_schedule("0 0 10 * * MON-FRI").is_ok(), "Six-field form should be valid");
}

#[test]
fn test_five_field_weekdays_match_unix_meaning() {
    let schedule = parse_schedule("0 10 * * 1-5").unwrap();

    // Sunday 2024-06-16 midnight UTC
    let start = Utc.with_ymd_and_hms(2024, 6, 16, 0, 0, 0).unwrap();
    let days: Vec<Weekday> = schedule.after(&start).take(5).map(|t| t.weekday()).collect();

    assert_eq!(
        days,
        vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
    );
}

#[test]
fn test_sunday_only() {
    let schedule = parse_schedule("0 20 * * 0").unwrap();
    let start = Utc.with_ymd_and_hms(2024, 6, 11, 0, 0, 0).unwrap();

    for fire in schedule.after(&start).take(3) {
        assert_eq!(fire.weekday(), Weekday::Sun);
    }
}

#[test]
fn test_invalid_expressions() {
    assert!(parse_schedule("every morning").is_err());
    assert!(parse_schedule("0 25 * * 1-5").is_err());
    assert!(parse_schedule("").is_err());
}

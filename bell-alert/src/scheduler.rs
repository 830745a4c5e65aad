//! Cron-driven alert scheduler.
//!
//! Each enabled market contributes two triggers (market open and closing
//! briefing). Every trigger runs as its own task that sleeps until the next
//! cron occurrence in the market's timezone and then spawns the tick, so a
//! slow or failing tick never shifts later firing times.
//!
//! # Cron Expressions
//!
//! Expressions use the `cron` crate syntax with a leading seconds field:
//!
//! ```text
//! sec  min  hour  day-of-month  month  day-of-week
//! 0    0    10    *             *      MON-FRI
//! ```
//!
//! Classic five-field expressions (`0 10 * * 1-5`) are accepted too: a `0`
//! seconds field is prefixed and numeric weekdays are shifted from the Unix
//! numbering (0 = Sunday) to the `cron` crate numbering (1 = Sunday).

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ConfigurationError;
use crate::market::{AlertKind, Market};
use crate::pipeline::AlertPipeline;

// ============================================================================
// Cron Parsing
// ============================================================================

/// Shift numeric Unix weekdays (0-7, 0 and 7 = Sunday) to `cron` crate weekdays (1-7, 1 = Sunday).
fn shift_unix_weekdays(field: &str) -> String {
    field
        .split(',')
        .map(|part| {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (part, None),
            };
            let mapped = range
                .split('-')
                .map(|token| match token.parse::<u8>() {
                    Ok(n) if n <= 7 => ((n % 7) + 1).to_string(),
                    _ => token.to_string(),
                })
                .collect::<Vec<_>>()
                .join("-");
            match step {
                Some(step) => format!("{}/{}", mapped, step),
                None => mapped,
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Normalize an expression to the `cron` crate's six/seven-field form.
pub fn normalize_cron_expression(expression: &str) -> String {
    let fields: Vec<&str> = expression.split_whitespace().collect();

    if fields.len() == 5 {
        format!(
            "0 {} {} {} {} {}",
            fields[0],
            fields[1],
            fields[2],
            fields[3],
            shift_unix_weekdays(fields[4])
        )
    } else {
        fields.join(" ")
    }
}

/// Parse a (possibly five-field) cron expression.
pub fn parse_schedule(expression: &str) -> Result<Schedule, cron::error::Error> {
    Schedule::from_str(&normalize_cron_expression(expression))
}

// ============================================================================
// Trigger
// ============================================================================

/// A (market, kind) pair bound to a cron schedule and timezone.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub market: Market,
    pub kind: AlertKind,
    pub expression: String,
    pub timezone: Tz,
    schedule: Schedule,
}

impl Trigger {
    pub fn new(market: Market, kind: AlertKind, expression: &str, timezone: Tz) -> Result<Self, ConfigurationError> {
        let schedule = parse_schedule(expression).map_err(|e| ConfigurationError::InvalidCron {
            market,
            field: match kind {
                AlertKind::MarketOpen => "open_cron",
                AlertKind::MarketBriefing => "close_cron",
            },
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            market,
            kind,
            expression: expression.to_string(),
            timezone,
            schedule,
        })
    }

    /// Get trigger name for logging
    pub fn name(&self) -> String {
        format!("{}/{}", self.market, self.kind)
    }

    /// First occurrence strictly after `after`, evaluated in the trigger's timezone.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(&self.timezone))
            .next()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Next fire time of a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingAlert {
    pub market: Market,
    pub kind: AlertKind,
    pub at: DateTime<Utc>,
    /// Timezone the trigger is evaluated in
    pub timezone: Tz,
}

// ============================================================================
// Clock
// ============================================================================

/// Wall-clock source for the trigger loops.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Handle to the running trigger tasks.
pub struct SchedulerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Number of running triggers.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop every trigger. Ticks already spawned run to completion.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!(triggers = self.tasks.len(), "Scheduler stopped");
    }
}

/// Fires alert ticks on cron schedules.
pub struct AlertScheduler {
    triggers: Vec<Arc<Trigger>>,
    pipeline: Arc<AlertPipeline>,
    clock: Arc<dyn Clock>,
}

impl AlertScheduler {
    pub fn new(triggers: Vec<Trigger>, pipeline: Arc<AlertPipeline>) -> Self {
        for trigger in &triggers {
            info!(
                trigger = %trigger.name(),
                cron = %trigger.expression,
                timezone = %trigger.timezone,
                "Trigger configured"
            );
        }

        Self {
            triggers: triggers.into_iter().map(Arc::new).collect(),
            pipeline,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock the trigger loops read.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn triggers(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.iter().map(|t| t.as_ref())
    }

    /// Next fire time of every trigger after `now`, earliest first.
    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<UpcomingAlert> {
        let mut upcoming: Vec<UpcomingAlert> = self
            .triggers
            .iter()
            .filter_map(|t| {
                t.next_after(now).map(|at| UpcomingAlert {
                    market: t.market,
                    kind: t.kind,
                    at,
                    timezone: t.timezone,
                })
            })
            .collect();

        upcoming.sort_by_key(|u| u.at);
        upcoming
    }

    /// Start one task per trigger.
    pub fn spawn(&self) -> SchedulerHandle {
        let tasks = self
            .triggers
            .iter()
            .map(|trigger| {
                tokio::spawn(run_trigger(
                    trigger.clone(),
                    self.pipeline.clone(),
                    self.clock.clone(),
                ))
            })
            .collect();

        info!(triggers = self.triggers.len(), "Scheduler started");
        SchedulerHandle { tasks }
    }
}

/// Sleep until each occurrence and spawn the tick.
async fn run_trigger(trigger: Arc<Trigger>, pipeline: Arc<AlertPipeline>, clock: Arc<dyn Clock>) {
    let mut cursor = clock.now();

    loop {
        let Some(next) = trigger.next_after(cursor) else {
            warn!(trigger = %trigger.name(), "Schedule has no further occurrences");
            return;
        };

        let wait = (next - clock.now()).to_std().unwrap_or_default();
        debug!(trigger = %trigger.name(), next = %next, wait_secs = wait.as_secs(), "Waiting for next occurrence");
        tokio::time::sleep(wait).await;

        let pipeline = pipeline.clone();
        let (market, kind) = (trigger.market, trigger.kind);
        tokio::spawn(async move {
            pipeline.run_tick(market, kind, next).await;
        });

        // Occurrences missed while sleeping (e.g. host suspend) are not replayed
        cursor = next.max(clock.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_normalize_five_field() {
        assert_eq!(normalize_cron_expression("0 10 * * 1-5"), "0 0 10 * * 2-6");
        assert_eq!(normalize_cron_expression("30 16 * * 0,6"), "0 30 16 * * 1,7");
        assert_eq!(normalize_cron_expression("0 20 * * 7"), "0 0 20 * * 1");
        assert_eq!(normalize_cron_expression("0 9 * * MON-FRI"), "0 0 9 * * MON-FRI");
        assert_eq!(normalize_cron_expression("*/15 9 * * *"), "0 */15 9 * * *");
    }

    #[test]
    fn test_normalize_keeps_six_field() {
        assert_eq!(normalize_cron_expression("  0 0 10  * * MON-FRI "), "0 0 10 * * MON-FRI");
    }

    #[test]
    fn test_next_after_uses_timezone() {
        let trigger = Trigger::new(
            Market::Set,
            AlertKind::MarketOpen,
            "0 0 10 * * MON-FRI",
            chrono_tz::Asia::Bangkok,
        )
        .unwrap();

        // Friday 2024-06-14 04:00 UTC is 11:00 Bangkok, past today's open
        let after = Utc.with_ymd_and_hms(2024, 6, 14, 4, 0, 0).unwrap();
        let next = trigger.next_after(after).unwrap();

        // Monday 2024-06-17 10:00 Bangkok = 03:00 UTC
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 17, 3, 0, 0).unwrap());
    }

    #[test]
    fn test_five_field_weekdays_skip_weekend() {
        let trigger = Trigger::new(Market::Nasdaq, AlertKind::MarketBriefing, "15 16 * * 1-5", chrono_tz::America::New_York)
            .unwrap();

        // Saturday 2024-06-15 noon UTC
        let after = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let next = trigger.next_after(after).unwrap().with_timezone(&chrono_tz::America::New_York);

        assert_eq!(next.date_naive(), chrono::NaiveDate::from_ymd_opt(2024, 6, 17).unwrap());
        assert_eq!((next.hour(), next.minute()), (16, 15));
    }

    #[test]
    fn test_invalid_cron_is_configuration_error() {
        let err = Trigger::new(Market::Set, AlertKind::MarketBriefing, "not a cron", chrono_tz::Asia::Bangkok)
            .unwrap_err();
        match err {
            ConfigurationError::InvalidCron { market, field, .. } => {
                assert_eq!(market, Market::Set);
                assert_eq!(field, "close_cron");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_trigger_name() {
        let trigger = Trigger::new(Market::Set, AlertKind::MarketOpen, "0 0 10 * * *", chrono_tz::Asia::Bangkok).unwrap();
        assert_eq!(trigger.name(), "SET/market_open");
    }
}

//! Query window resolution.
//!
//! Each bound of the window is either an absolute timestamp or a relative
//! expression anchored at the wall clock:
//!
//! - `now` (alias `today`)
//! - `now-<N><unit>` with unit `d` (days), `w` (weeks), `m` (months) or
//!   `y` (years)
//!
//! Absolute bounds accept RFC 3339, naive ISO date-times (taken as UTC) and
//! bare `YYYY-MM-DD` dates (midnight UTC). Anything else is rejected.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use regex::Regex;
use tracing::debug;

use crate::config::QueryConfig;
use crate::error::WindowError;
use crate::types::{QueryWindow, DEFAULT_QUERY_LIMIT};

/// Unit suffix of a relative date expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl RelativeUnit {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "d" => Some(Self::Days),
            "w" => Some(Self::Weeks),
            "m" => Some(Self::Months),
            "y" => Some(Self::Years),
            _ => None,
        }
    }
}

/// A parsed, not yet evaluated, window bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateExpr {
    Absolute(DateTime<Utc>),
    /// `now` minus `amount` units. `now` alone is an amount of zero days.
    Relative { amount: u32, unit: RelativeUnit },
}

fn relative_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:now|today)(?:-([0-9]+)([a-z]))?$").expect("Invalid relative date regex")
    })
}

fn parse_absolute(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl FromStr for DateExpr {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WindowError::InvalidDateExpression {
            expression: s.to_string(),
        };
        let trimmed = s.trim();

        if let Some(caps) = relative_pattern().captures(trimmed) {
            return match (caps.get(1), caps.get(2)) {
                (None, None) => Ok(DateExpr::Relative {
                    amount: 0,
                    unit: RelativeUnit::Days,
                }),
                (Some(amount), Some(unit)) => {
                    let amount: u32 = amount.as_str().parse().map_err(|_| invalid())?;
                    let unit = RelativeUnit::parse(unit.as_str()).ok_or_else(invalid)?;
                    Ok(DateExpr::Relative { amount, unit })
                }
                _ => Err(invalid()),
            };
        }

        parse_absolute(trimmed)
            .map(DateExpr::Absolute)
            .ok_or_else(invalid)
    }
}

impl DateExpr {
    /// Evaluate the expression against `now`.
    ///
    /// Day and week offsets are exact durations, so two evaluations differ
    /// only by the distance between their `now` instants. Month and year
    /// offsets are calendar-aware and clamp to the end of shorter months.
    pub fn evaluate(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            DateExpr::Absolute(dt) => Some(dt),
            DateExpr::Relative { amount, unit } => match unit {
                RelativeUnit::Days => {
                    now.checked_sub_signed(TimeDelta::try_days(i64::from(amount))?)
                }
                RelativeUnit::Weeks => {
                    now.checked_sub_signed(TimeDelta::try_weeks(i64::from(amount))?)
                }
                RelativeUnit::Months => now.checked_sub_months(Months::new(amount)),
                RelativeUnit::Years => {
                    now.checked_sub_months(Months::new(amount.checked_mul(12)?))
                }
            },
        }
    }
}

/// Parses and validates the query window from configuration.
///
/// The clock is consulted once per bound, so `start` and `end` are not
/// guaranteed to share an evaluation instant.
pub struct QueryWindowResolver<F> {
    clock: F,
}

impl QueryWindowResolver<fn() -> DateTime<Utc>> {
    /// A resolver reading the system wall clock.
    pub fn system() -> Self {
        Self { clock: Utc::now }
    }
}

impl<F> QueryWindowResolver<F>
where
    F: Fn() -> DateTime<Utc>,
{
    pub fn with_clock(clock: F) -> Self {
        Self { clock }
    }

    fn resolve_bound(&self, raw: &str) -> Result<DateTime<Utc>, WindowError> {
        let expr: DateExpr = raw.parse()?;
        expr.evaluate((self.clock)())
            .ok_or_else(|| WindowError::InvalidDateExpression {
                expression: raw.to_string(),
            })
    }

    /// Resolve `raw` into a validated [`QueryWindow`].
    pub fn resolve(&self, raw: &QueryConfig) -> Result<QueryWindow, WindowError> {
        let start = self.resolve_bound(&raw.publish_date.start)?;
        let end = self.resolve_bound(&raw.publish_date.end)?;

        let limit = match raw.limit {
            None => DEFAULT_QUERY_LIMIT,
            Some(n) if n <= 0 => return Err(WindowError::NonPositiveLimit(n)),
            Some(n) => usize::try_from(n).map_err(|_| WindowError::NonPositiveLimit(n))?,
        };

        let window = QueryWindow::new(start, end, limit)?;
        debug!(
            start = %window.start(),
            end = %window.end(),
            limit = window.limit(),
            "Resolved query window"
        );
        Ok(window)
    }
}

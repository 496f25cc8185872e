//! Period arithmetic for range partitions.
//!
//! Every partition holds exactly one period of its table's [`PeriodUnit`]. A
//! partition is named after the period it holds and bounded by the start of
//! the following period (`VALUES LESS THAN`). All instants are UTC.
//!
//! | Unit    | Period start            | Name          |
//! |---------|-------------------------|---------------|
//! | daily   | 00:00                   | `p2025_01_10` |
//! | weekly  | Monday 00:00 (ISO week) | `p2025_02w`   |
//! | monthly | 1st of month 00:00      | `p2025_01`    |
//! | yearly  | 1st of January 00:00    | `p2025`       |
//!
//! Weekly periods always anchor to ISO Monday, never to a table's own data,
//! so repeated runs produce identical names.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Partition granularity of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Boundary arithmetic for one [`PeriodUnit`].
struct PeriodStrategy {
    label: &'static str,
    name_format: &'static str,
    truncate: fn(NaiveDate) -> NaiveDate,
    step: fn(NaiveDate, i32) -> Option<NaiveDate>,
}

/// Indexed by `PeriodUnit as usize`.
static STRATEGIES: [PeriodStrategy; 4] = [
    PeriodStrategy {
        label: "daily",
        name_format: "p%Y_%m_%d",
        truncate: truncate_day,
        step: step_days,
    },
    PeriodStrategy {
        label: "weekly",
        name_format: "p%G_%Vw",
        truncate: truncate_iso_week,
        step: step_weeks,
    },
    PeriodStrategy {
        label: "monthly",
        name_format: "p%Y_%m",
        truncate: truncate_month,
        step: step_months,
    },
    PeriodStrategy {
        label: "yearly",
        name_format: "p%Y",
        truncate: truncate_year,
        step: step_years,
    },
];

fn truncate_day(date: NaiveDate) -> NaiveDate {
    date
}

fn truncate_iso_week(date: NaiveDate) -> NaiveDate {
    date.checked_sub_signed(TimeDelta::days(date.weekday().num_days_from_monday() as i64))
        .unwrap_or(date)
}

fn truncate_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn truncate_year(date: NaiveDate) -> NaiveDate {
    date.with_ordinal(1).unwrap_or(date)
}

fn step_days(date: NaiveDate, n: i32) -> Option<NaiveDate> {
    date.checked_add_signed(TimeDelta::days(n as i64))
}

fn step_weeks(date: NaiveDate, n: i32) -> Option<NaiveDate> {
    date.checked_add_signed(TimeDelta::weeks(n as i64))
}

fn step_months(date: NaiveDate, n: i32) -> Option<NaiveDate> {
    if n >= 0 {
        date.checked_add_months(Months::new(n as u32))
    } else {
        date.checked_sub_months(Months::new(n.unsigned_abs()))
    }
}

fn step_years(date: NaiveDate, n: i32) -> Option<NaiveDate> {
    step_months(date, n.checked_mul(12)?)
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

impl PeriodUnit {
    pub const ALL: [PeriodUnit; 4] = [
        PeriodUnit::Daily,
        PeriodUnit::Weekly,
        PeriodUnit::Monthly,
        PeriodUnit::Yearly,
    ];

    fn strategy(self) -> &'static PeriodStrategy {
        &STRATEGIES[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.strategy().label
    }

    /// Start of the period containing `at`.
    pub fn period_start(self, at: DateTime<Utc>) -> DateTime<Utc> {
        midnight((self.strategy().truncate)(at.date_naive()))
    }

    /// Moves a period start by `periods` whole periods (negative moves back),
    /// or `None` past the calendar's representable range.
    pub fn checked_shift(self, start: DateTime<Utc>, periods: i32) -> Option<DateTime<Utc>> {
        let strategy = self.strategy();
        (strategy.step)((strategy.truncate)(start.date_naive()), periods).map(midnight)
    }

    /// Like [`checked_shift`](Self::checked_shift), saturating at the first or
    /// last representable day.
    pub fn shift(self, start: DateTime<Utc>, periods: i32) -> DateTime<Utc> {
        self.checked_shift(start, periods).unwrap_or_else(|| {
            midnight(if periods < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
        })
    }

    /// Partition name for the period starting at `start`.
    pub fn partition_name(self, start: DateTime<Utc>) -> String {
        start.format(self.strategy().name_format).to_string()
    }

    /// Name and exclusive upper boundary of the period containing `at`.
    pub fn boundary_containing(self, at: DateTime<Utc>) -> PartitionBoundary {
        let start = self.period_start(at);
        PartitionBoundary {
            unit: self,
            name: self.partition_name(start),
            start,
            upper: self.shift(start, 1),
        }
    }

    /// Every period whose start lies in `[period_start(from), until)`, ascending.
    pub fn series(self, from: DateTime<Utc>, until: DateTime<Utc>) -> Vec<PartitionBoundary> {
        let mut out = Vec::new();
        let mut current = self.boundary_containing(from);
        while current.start < until {
            let next = current.next();
            let stalled = next.start <= current.start;
            out.push(current);
            if stalled {
                break;
            }
            current = next;
        }
        out
    }
}

impl fmt::Display for PeriodUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A partition derived from the calendar: the period `[start, upper)` and its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionBoundary {
    pub unit: PeriodUnit,
    pub name: String,
    pub start: DateTime<Utc>,
    /// Exclusive upper bound (`VALUES LESS THAN`).
    pub upper: DateTime<Utc>,
}

impl PartitionBoundary {
    /// The period immediately after this one.
    pub fn next(&self) -> Self {
        self.unit.boundary_containing(self.upper)
    }

    /// The period immediately before this one.
    pub fn previous(&self) -> Self {
        self.unit.boundary_containing(self.unit.shift(self.start, -1))
    }

    /// The `count` periods after this one, ascending.
    pub fn following(&self, count: usize) -> Vec<Self> {
        let mut out = Vec::with_capacity(count);
        let mut current = self.clone();
        for _ in 0..count {
            current = current.next();
            out.push(current.clone());
        }
        out
    }

    /// The `count` periods before this one, ascending.
    pub fn preceding(&self, count: usize) -> Vec<Self> {
        let mut out = Vec::with_capacity(count);
        let mut current = self.clone();
        for _ in 0..count {
            current = current.previous();
            out.push(current.clone());
        }
        out.reverse();
        out
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.upper
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Retention
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionUnit {
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl RetentionUnit {
    fn suffix(self) -> char {
        match self {
            RetentionUnit::Hours => 'h',
            RetentionUnit::Days => 'd',
            RetentionUnit::Weeks => 'w',
            RetentionUnit::Months => 'm',
            RetentionUnit::Years => 'y',
        }
    }
}

/// How long data is kept, written as `<amount><unit>` (`14d`, `12m`, `1y`).
///
/// Months and years are calendar arithmetic; a cutoff that would land past
/// the end of a shorter month is clamped to its last day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RetentionPeriod {
    pub amount: u32,
    pub unit: RetentionUnit,
}

/// Keeps every cutoff well inside chrono's representable range.
const MAX_RETENTION_AMOUNT: u32 = 99_999;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid retention period '{0}': expected <number><h|d|w|m|y>, e.g. 14d")]
pub struct InvalidRetention(String);

impl RetentionPeriod {
    pub fn days(amount: u32) -> Self {
        Self {
            amount,
            unit: RetentionUnit::Days,
        }
    }

    /// The instant `self` before `now`, saturating at the earliest
    /// representable instant.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let amount = self.amount as i64;
        let cutoff = match self.unit {
            RetentionUnit::Hours => now.checked_sub_signed(TimeDelta::hours(amount)),
            RetentionUnit::Days => now.checked_sub_signed(TimeDelta::days(amount)),
            RetentionUnit::Weeks => now.checked_sub_signed(TimeDelta::weeks(amount)),
            RetentionUnit::Months => now.checked_sub_months(Months::new(self.amount)),
            RetentionUnit::Years => {
                now.checked_sub_months(Months::new(self.amount.saturating_mul(12)))
            }
        };
        cutoff.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl FromStr for RetentionPeriod {
    type Err = InvalidRetention;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidRetention(s.to_string());
        let trimmed = s.trim();
        let suffix = trimmed.chars().last().ok_or_else(invalid)?;
        let unit = match suffix.to_ascii_lowercase() {
            'h' => RetentionUnit::Hours,
            'd' => RetentionUnit::Days,
            'w' => RetentionUnit::Weeks,
            'm' => RetentionUnit::Months,
            'y' => RetentionUnit::Years,
            _ => return Err(invalid()),
        };
        let digits = &trimmed[..trimmed.len() - suffix.len_utf8()];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let amount: u32 = digits.parse().map_err(|_| invalid())?;
        if amount > MAX_RETENTION_AMOUNT {
            return Err(invalid());
        }
        Ok(Self { amount, unit })
    }
}

impl TryFrom<String> for RetentionPeriod {
    type Error = InvalidRetention;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RetentionPeriod> for String {
    fn from(value: RetentionPeriod) -> Self {
        value.to_string()
    }
}

impl fmt::Display for RetentionPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

/// The span a run keeps: everything at or after `cutoff`, up to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionWindow {
    pub cutoff: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

impl RetentionWindow {
    pub fn new(now: DateTime<Utc>, retention: RetentionPeriod) -> Self {
        Self {
            cutoff: retention.cutoff(now),
            now,
        }
    }

    /// A partition bounded by `upper` holds only rows older than the cutoff.
    pub fn is_expired(&self, upper: DateTime<Utc>) -> bool {
        upper <= self.cutoff
    }
}

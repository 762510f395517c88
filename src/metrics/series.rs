use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::database::client::{SqlParam, SqlRow, TenantClient};
use crate::metrics::{first_rows, timestamp_exprs, QueryVariant};
use crate::schema::UserTableSchema;

/// Used when the earliest record cannot be looked up for `TimeRange::All`
pub const ALL_RANGE_FALLBACK_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    pub fn granularity(&self) -> Granularity {
        match self {
            TimeRange::SevenDays | TimeRange::ThirtyDays => Granularity::Daily,
            TimeRange::All => Granularity::Weekly,
        }
    }

    /// Start date for fixed ranges; `None` for `All`
    pub fn fixed_start(&self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            TimeRange::SevenDays => Some(today - Duration::days(7)),
            TimeRange::ThirtyDays => Some(today - Duration::days(30)),
            TimeRange::All => None,
        }
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "7d" => Ok(TimeRange::SevenDays),
            "30d" => Ok(TimeRange::ThirtyDays),
            "all" => Ok(TimeRange::All),
            other => Err(format!("unknown range '{}', expected 7d, 30d or all", other)),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeRange::SevenDays => "7d",
            TimeRange::ThirtyDays => "30d",
            TimeRange::All => "all",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Daily,
    Weekly,
}

impl Granularity {
    pub fn step_days(&self) -> i64 {
        match self {
            Granularity::Daily => 1,
            Granularity::Weekly => 7,
        }
    }

    /// SQL rendering of a timestamp expression's bucket as `YYYY-MM-DD`.
    /// Weeks start on Monday, matching `date_trunc('week', ...)`.
    pub fn bucket_sql(&self, ts_expr: &str) -> String {
        match self {
            Granularity::Daily => format!("to_char(({})::date, 'YYYY-MM-DD')", ts_expr),
            Granularity::Weekly => format!("to_char(date_trunc('week', {})::date, 'YYYY-MM-DD')", ts_expr),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: u64,
}

/// Bucket containing `date`
pub fn bucket_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Daily => date,
        Granularity::Weekly => date - Duration::days(date.weekday().num_days_from_monday() as i64),
    }
}

/// Gap-free bucket boundaries covering `start..=end`
pub fn bucket_dates(start: NaiveDate, end: NaiveDate, granularity: Granularity) -> Vec<NaiveDate> {
    let step = Duration::days(granularity.step_days());
    let mut current = bucket_start(start, granularity);
    let mut dates = Vec::new();
    while current <= end {
        dates.push(current);
        current += step;
    }
    dates
}

/// One point per bucket, 0 where no aggregate row exists
pub fn fill_series(buckets: &[NaiveDate], values: &HashMap<NaiveDate, u64>) -> Vec<SeriesPoint> {
    buckets
        .iter()
        .map(|date| SeriesPoint {
            date: *date,
            value: values.get(date).copied().unwrap_or(0),
        })
        .collect()
}

/// `(YYYY-MM-DD, count)` rows into a lookup; malformed rows are skipped
pub(crate) fn parse_bucket_rows(rows: &[SqlRow]) -> HashMap<NaiveDate, u64> {
    rows.iter()
        .filter_map(|row| {
            let date = NaiveDate::parse_from_str(row.get_str(0)?, "%Y-%m-%d").ok()?;
            let value = row.get_i64(1).filter(|v| *v >= 0)?;
            Some((date, value as u64))
        })
        .collect()
}

pub(crate) fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now)
}

/// First displayed date for `range`. `All` starts at the earliest created-at
/// record, falling back to a year ago when that lookup fails or finds nothing.
pub(crate) async fn series_start(
    client: &dyn TenantClient,
    schema: &UserTableSchema,
    range: TimeRange,
    today: NaiveDate,
) -> NaiveDate {
    if let Some(start) = range.fixed_start(today) {
        return start;
    }

    let variants = timestamp_exprs(&schema.created_at_column)
        .into_iter()
        .map(|(label, ts)| {
            QueryVariant::new(
                label,
                format!(
                    "SELECT to_char(MIN({})::date, 'YYYY-MM-DD') FROM {}",
                    ts,
                    schema.qualified_name()
                ),
                vec![],
            )
        })
        .collect();

    first_rows(client, variants)
        .await
        .and_then(|rows| {
            let first = rows.first()?;
            NaiveDate::parse_from_str(first.get_str(0)?, "%Y-%m-%d").ok()
        })
        .map(|earliest| earliest.min(today))
        .unwrap_or_else(|| today - Duration::days(ALL_RANGE_FALLBACK_DAYS))
}

/// Per-bucket row counts of `ts_column` within `[from, until)`
pub(crate) fn bucket_count_variants(
    schema: &UserTableSchema,
    ts_column: &str,
    granularity: Granularity,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Vec<QueryVariant> {
    timestamp_exprs(ts_column)
        .into_iter()
        .map(|(label, ts)| {
            QueryVariant::new(
                label,
                format!(
                    "SELECT {bucket} AS bucket, COUNT(*) AS value FROM {table} \
                     WHERE {ts} >= $1 AND {ts} < $2 GROUP BY 1 ORDER BY 1",
                    bucket = granularity.bucket_sql(&ts),
                    table = schema.qualified_name(),
                    ts = ts,
                ),
                vec![SqlParam::Timestamp(from), SqlParam::Timestamp(until)],
            )
        })
        .collect()
}

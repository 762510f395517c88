use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::database::client::{SqlParam, TenantClient};
use crate::database::sql::quote_identifier;
use crate::metrics::series::{
    bucket_dates, fill_series, midnight, parse_bucket_rows, series_start, Granularity, SeriesPoint, TimeRange,
};
use crate::metrics::{first_rows, timestamp_exprs, QueryVariant};
use crate::schema::{SchemaResolver, UserTableSchema};

pub const WAU_WINDOW_DAYS: i64 = 7;

/// Distinct users active in the 7 days ending at each bucket.
///
/// Activity is read from the last-active column, else updated-at; empty when
/// the table has neither.
pub async fn get_weekly_active_users(client: &dyn TenantClient, range: TimeRange) -> Vec<SeriesPoint> {
    match SchemaResolver::new(client).resolve_user_table().await {
        Some(schema) => weekly_active_users(client, &schema, range).await,
        None => Vec::new(),
    }
}

pub async fn weekly_active_users(client: &dyn TenantClient, schema: &UserTableSchema, range: TimeRange) -> Vec<SeriesPoint> {
    let Some(activity_column) = schema.activity_column() else {
        return Vec::new();
    };

    let today = Utc::now().date_naive();
    let granularity = range.granularity();
    let start = series_start(client, schema, range, today).await;
    let buckets = bucket_dates(start, today, granularity);
    let (Some(first), Some(last)) = (buckets.first().copied(), buckets.last().copied()) else {
        return Vec::new();
    };

    // Lead-in so the first displayed bucket has a full trailing window
    let lookback_from = midnight(first - Duration::days(WAU_WINDOW_DAYS));
    let until = midnight(last + Duration::days(granularity.step_days()));

    let variants = wau_variants(schema, activity_column, granularity, first, last, lookback_from, until);
    match first_rows(client, variants).await {
        Some(rows) => fill_series(&buckets, &parse_bucket_rows(&rows)),
        None => Vec::new(),
    }
}

fn wau_variants(
    schema: &UserTableSchema,
    activity_column: &str,
    granularity: Granularity,
    first_bucket: NaiveDate,
    last_bucket: NaiveDate,
    lookback_from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Vec<QueryVariant> {
    let step = granularity.step_days();
    let id = quote_identifier(&schema.id_column);

    timestamp_exprs(activity_column)
        .into_iter()
        .map(|(label, ts)| {
            QueryVariant::new(
                label,
                format!(
                    "WITH activity AS ( \
                         SELECT {id} AS user_id, {ts} AS active_at FROM {table} \
                         WHERE {ts} >= $1 AND {ts} < $2 \
                     ), buckets AS ( \
                         SELECT generate_series($3::date, $4::date, interval '{step} days')::date AS bucket \
                     ) \
                     SELECT to_char(b.bucket, 'YYYY-MM-DD') AS bucket, COUNT(DISTINCT a.user_id) AS value \
                     FROM buckets b \
                     LEFT JOIN activity a \
                       ON a.active_at >= b.bucket + interval '{step} days' - interval '{window} days' \
                      AND a.active_at < b.bucket + interval '{step} days' \
                     GROUP BY b.bucket ORDER BY b.bucket",
                    id = id,
                    ts = ts,
                    table = schema.qualified_name(),
                    step = step,
                    window = WAU_WINDOW_DAYS,
                ),
                vec![
                    SqlParam::Timestamp(lookback_from),
                    SqlParam::Timestamp(until),
                    SqlParam::Text(first_bucket.format("%Y-%m-%d").to_string()),
                    SqlParam::Text(last_bucket.format("%Y-%m-%d").to_string()),
                ],
            )
        })
        .collect()
}

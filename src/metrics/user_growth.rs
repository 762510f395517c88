use chrono::{Duration, Utc};

use crate::database::client::{SqlParam, TenantClient};
use crate::metrics::series::{
    bucket_count_variants, bucket_dates, midnight, parse_bucket_rows, series_start, SeriesPoint, TimeRange,
};
use crate::metrics::{first_count, first_rows, timestamp_exprs, QueryVariant};
use crate::schema::{SchemaResolver, UserTableSchema};

/// Cumulative user count at the end of each bucket in `range`
pub async fn get_user_growth_data(client: &dyn TenantClient, range: TimeRange) -> Vec<SeriesPoint> {
    match SchemaResolver::new(client).resolve_user_table().await {
        Some(schema) => user_growth_data(client, &schema, range).await,
        None => Vec::new(),
    }
}

pub async fn user_growth_data(client: &dyn TenantClient, schema: &UserTableSchema, range: TimeRange) -> Vec<SeriesPoint> {
    let today = Utc::now().date_naive();
    let granularity = range.granularity();
    let start = series_start(client, schema, range, today).await;
    let buckets = bucket_dates(start, today, granularity);
    let Some(first_bucket) = buckets.first().copied() else {
        return Vec::new();
    };

    let from = midnight(first_bucket);
    let until = midnight(today + Duration::days(1));

    let Some(baseline) = first_count(client, created_before_variants(schema, from)).await else {
        return Vec::new();
    };
    let Some(rows) = first_rows(
        client,
        bucket_count_variants(schema, &schema.created_at_column, granularity, from, until),
    )
    .await
    else {
        return Vec::new();
    };

    let per_bucket = parse_bucket_rows(&rows);
    let mut running = baseline;
    buckets
        .into_iter()
        .map(|date| {
            running += per_bucket.get(&date).copied().unwrap_or(0);
            SeriesPoint { date, value: running }
        })
        .collect()
}

fn created_before_variants(schema: &UserTableSchema, before: chrono::DateTime<Utc>) -> Vec<QueryVariant> {
    timestamp_exprs(&schema.created_at_column)
        .into_iter()
        .map(|(label, ts)| {
            QueryVariant::new(
                label,
                format!("SELECT COUNT(*) FROM {} WHERE {} < $1", schema.qualified_name(), ts),
                vec![SqlParam::Timestamp(before)],
            )
        })
        .collect()
}

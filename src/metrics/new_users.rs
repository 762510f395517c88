use chrono::{Duration, Utc};

use crate::database::client::TenantClient;
use crate::metrics::first_rows;
use crate::metrics::series::{
    bucket_count_variants, bucket_dates, fill_series, midnight, parse_bucket_rows, series_start, SeriesPoint,
    TimeRange,
};
use crate::schema::{SchemaResolver, UserTableSchema};

/// New signups per bucket in `range`, zero-filled
pub async fn get_new_users_data(client: &dyn TenantClient, range: TimeRange) -> Vec<SeriesPoint> {
    match SchemaResolver::new(client).resolve_user_table().await {
        Some(schema) => new_users_data(client, &schema, range).await,
        None => Vec::new(),
    }
}

pub async fn new_users_data(client: &dyn TenantClient, schema: &UserTableSchema, range: TimeRange) -> Vec<SeriesPoint> {
    let today = Utc::now().date_naive();
    let granularity = range.granularity();
    let start = series_start(client, schema, range, today).await;
    let buckets = bucket_dates(start, today, granularity);
    let Some(first_bucket) = buckets.first().copied() else {
        return Vec::new();
    };

    let variants = bucket_count_variants(
        schema,
        &schema.created_at_column,
        granularity,
        midnight(first_bucket),
        midnight(today + Duration::days(1)),
    );

    match first_rows(client, variants).await {
        Some(rows) => fill_series(&buckets, &parse_bucket_rows(&rows)),
        None => Vec::new(),
    }
}

use chrono::{Duration, Utc};

use crate::database::client::{SqlParam, TenantClient};
use crate::metrics::{first_count, timestamp_exprs, QueryVariant};
use crate::schema::{SchemaResolver, UserTableSchema};

/// Users created in the last `days` days (the dashboard uses 7 and 30).
/// Returns 0 when there is no user table or no query shape works.
pub async fn get_new_signups(client: &dyn TenantClient, days: u32) -> u64 {
    match SchemaResolver::new(client).resolve_user_table().await {
        Some(schema) => new_signups(client, &schema, days).await,
        None => 0,
    }
}

pub async fn new_signups(client: &dyn TenantClient, schema: &UserTableSchema, days: u32) -> u64 {
    let since = Utc::now() - Duration::days(days as i64);
    first_count(client, created_since_variants(schema, since)).await.unwrap_or(0)
}

pub(crate) fn created_since_variants(
    schema: &UserTableSchema,
    since: chrono::DateTime<Utc>,
) -> Vec<QueryVariant> {
    timestamp_exprs(&schema.created_at_column)
        .into_iter()
        .map(|(label, ts)| {
            QueryVariant::new(
                label,
                format!("SELECT COUNT(*) FROM {} WHERE {} >= $1", schema.qualified_name(), ts),
                vec![SqlParam::Timestamp(since)],
            )
        })
        .collect()
}

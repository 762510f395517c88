use chrono::{DateTime, Duration, Utc};

use crate::database::client::{SqlParam, TenantClient};
use crate::database::models::MetricSnapshot;
use crate::database::sql::quote_identifier;
use crate::metrics::paid_users::active_paid_users;
use crate::metrics::signups::new_signups;
use crate::metrics::user_count::user_count;
use crate::metrics::{first_count, timestamp_exprs, QueryVariant};
use crate::schema::{SchemaResolver, UserTableSchema};

pub const SNAPSHOT_ACTIVE_DAYS: u32 = 7;
pub const SNAPSHOT_SIGNUP_DAYS: u32 = 30;
pub const SNAPSHOT_CHURN_DAYS: u32 = 30;

/// Distinct users with activity in the last `days` days; `None` without an
/// activity column
pub async fn get_active_users(client: &dyn TenantClient, days: u32) -> Option<u64> {
    let schema = SchemaResolver::new(client).resolve_user_table().await?;
    active_users(client, &schema, days).await
}

pub async fn active_users(client: &dyn TenantClient, schema: &UserTableSchema, days: u32) -> Option<u64> {
    let column = schema.activity_column()?;
    let since = Utc::now() - Duration::days(days as i64);
    let id = quote_identifier(&schema.id_column);
    first_count(client, window_variants(schema, column, &format!("COUNT(DISTINCT {})", id), since)).await
}

/// Users soft-deleted in the last `days` days; `None` without a deleted-at column
pub async fn get_churned_users(client: &dyn TenantClient, days: u32) -> Option<u64> {
    let schema = SchemaResolver::new(client).resolve_user_table().await?;
    churned_users(client, &schema, days).await
}

pub async fn churned_users(client: &dyn TenantClient, schema: &UserTableSchema, days: u32) -> Option<u64> {
    let column = schema.deleted_at_column.as_deref()?;
    let since = Utc::now() - Duration::days(days as i64);
    first_count(client, window_variants(schema, column, "COUNT(*)", since)).await
}

fn window_variants(schema: &UserTableSchema, column: &str, aggregate: &str, since: DateTime<Utc>) -> Vec<QueryVariant> {
    timestamp_exprs(column)
        .into_iter()
        .map(|(label, ts)| {
            QueryVariant::new(
                label,
                format!("SELECT {} FROM {} WHERE {} >= $1", aggregate, schema.qualified_name(), ts),
                vec![SqlParam::Timestamp(since)],
            )
        })
        .collect()
}

/// Point-in-time snapshot of every metric, all read against one resolved schema
pub async fn collect_snapshot(client: &dyn TenantClient, schema: Option<&UserTableSchema>) -> MetricSnapshot {
    let date = Utc::now();
    let Some(schema) = schema else {
        return MetricSnapshot {
            total_users: None,
            paid_users: None,
            active_users: None,
            new_signups: 0,
            churned_users: None,
            date,
        };
    };

    let (total_users, paid_users, active, new_signups, churned) = tokio::join!(
        user_count(client, schema),
        active_paid_users(client, schema),
        active_users(client, schema, SNAPSHOT_ACTIVE_DAYS),
        new_signups(client, schema, SNAPSHOT_SIGNUP_DAYS),
        churned_users(client, schema, SNAPSHOT_CHURN_DAYS),
    );

    MetricSnapshot {
        total_users,
        paid_users,
        active_users: active,
        new_signups,
        churned_users: churned,
        date,
    }
}

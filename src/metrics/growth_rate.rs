use chrono::{Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::database::client::{SqlParam, TenantClient};
use crate::metrics::{first_count, timestamp_exprs, QueryVariant};
use crate::schema::{SchemaResolver, UserTableSchema};

pub const GROWTH_WINDOW_DAYS: i64 = 30;

/// Percentage growth of the user base over the trailing 30 days.
///
/// `None` when the tenant has no user older than the window, at most one
/// user in total, or the counts cannot be obtained.
pub async fn get_growth_rates(client: &dyn TenantClient) -> Option<f64> {
    let schema = SchemaResolver::new(client).resolve_user_table().await?;
    growth_rates(client, &schema).await
}

pub async fn growth_rates(client: &dyn TenantClient, schema: &UserTableSchema) -> Option<f64> {
    let now = Utc::now();
    let cutoff = now - Duration::days(GROWTH_WINDOW_DAYS);

    let old_count = first_count(client, created_until_variants(schema, cutoff)).await?;
    let new_count = first_count(client, created_until_variants(schema, now)).await?;
    growth_rate(old_count, new_count)
}

/// `((new - old) / old) * 100`, rounded half away from zero to 2 decimals
pub fn growth_rate(old_count: u64, new_count: u64) -> Option<f64> {
    if new_count <= 1 || old_count == 0 {
        return None;
    }

    let old = Decimal::from(old_count);
    let new = Decimal::from(new_count);
    ((new - old) / old * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
}

fn created_until_variants(schema: &UserTableSchema, until: chrono::DateTime<Utc>) -> Vec<QueryVariant> {
    timestamp_exprs(&schema.created_at_column)
        .into_iter()
        .map(|(label, ts)| {
            QueryVariant::new(
                label,
                format!("SELECT COUNT(*) FROM {} WHERE {} <= $1", schema.qualified_name(), ts),
                vec![SqlParam::Timestamp(until)],
            )
        })
        .collect()
}

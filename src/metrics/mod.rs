//! Metric extractors.
//!
//! Every extractor resolves (or is handed) the tenant's user-table schema,
//! tries an ordered list of SQL variants and takes the first one that
//! answers. Nothing here returns an error: a metric that cannot be computed
//! comes back as its "unknown" value (`None`, `0` or an empty series).

pub mod growth_rate;
pub mod new_users;
pub mod paid_users;
pub mod series;
pub mod signups;
pub mod snapshot;
pub mod user_count;
pub mod user_growth;
pub mod weekly_active;

use tracing::debug;

use crate::database::client::{fetch_count, SqlParam, SqlRow, TenantClient};
use crate::database::sql::quote_identifier;

pub use growth_rate::{get_growth_rates, growth_rate};
pub use new_users::get_new_users_data;
pub use paid_users::get_active_paid_users;
pub use series::{SeriesPoint, TimeRange};
pub use signups::get_new_signups;
pub use snapshot::{collect_snapshot, get_active_users, get_churned_users};
pub use user_count::get_user_count;
pub use user_growth::get_user_growth_data;
pub use weekly_active::get_weekly_active_users;

/// One SQL shape for a metric question
#[derive(Debug, Clone, PartialEq)]
pub struct QueryVariant {
    pub label: &'static str,
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl QueryVariant {
    pub fn new(label: &'static str, sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self { label, sql: sql.into(), params }
    }
}

/// Timestamp expressions for a column: as stored, then cast for text-typed columns
pub(crate) fn timestamp_exprs(column: &str) -> Vec<(&'static str, String)> {
    let quoted = quote_identifier(column);
    vec![
        ("native", quoted.clone()),
        ("timestamptz-cast", format!("{}::timestamptz", quoted)),
    ]
}

/// First variant returning a non-negative count
pub(crate) async fn first_count(client: &dyn TenantClient, variants: Vec<QueryVariant>) -> Option<u64> {
    for variant in variants {
        match fetch_count(client, &variant.sql, &variant.params).await {
            Ok(Some(n)) if n >= 0 => return Some(n as u64),
            Ok(other) => debug!("Variant {} returned unusable count {:?}", variant.label, other),
            Err(e) => debug!("Variant {} failed: {}", variant.label, e),
        }
    }
    None
}

/// Rows of the first variant that executes
pub(crate) async fn first_rows(client: &dyn TenantClient, variants: Vec<QueryVariant>) -> Option<Vec<SqlRow>> {
    for variant in variants {
        match client.fetch_all(&variant.sql, &variant.params).await {
            Ok(rows) => return Some(rows),
            Err(e) => debug!("Variant {} failed: {}", variant.label, e),
        }
    }
    None
}

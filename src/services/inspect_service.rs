use serde::{Deserialize, Serialize};

use crate::database::client::TenantClient;
use crate::metrics::growth_rate::growth_rates;
use crate::metrics::new_users::new_users_data;
use crate::metrics::paid_users::active_paid_users;
use crate::metrics::signups::new_signups;
use crate::metrics::user_count::user_count;
use crate::metrics::user_growth::user_growth_data;
use crate::metrics::weekly_active::weekly_active_users;
use crate::metrics::{SeriesPoint, TimeRange};
use crate::schema::{PaidUserSource, SchemaResolver, UserTableSchema};

/// What the heuristics found in one database and every metric computed from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectReport {
    pub range: TimeRange,
    pub user_table: Option<UserTableSchema>,
    pub paid_source: Option<PaidUserSource>,
    pub total_users: Option<u64>,
    pub paid_users: Option<u64>,
    pub new_signups_7d: u64,
    pub new_signups_30d: u64,
    pub growth_rate: Option<f64>,
    pub user_growth: Vec<SeriesPoint>,
    pub new_users: Vec<SeriesPoint>,
    pub weekly_active_users: Vec<SeriesPoint>,
}

impl InspectReport {
    fn unresolved(range: TimeRange) -> Self {
        Self {
            range,
            user_table: None,
            paid_source: None,
            total_users: None,
            paid_users: None,
            new_signups_7d: 0,
            new_signups_30d: 0,
            growth_rate: None,
            user_growth: Vec::new(),
            new_users: Vec::new(),
            weekly_active_users: Vec::new(),
        }
    }
}

/// Run schema discovery and all seven extractors against one database
pub async fn inspect_database(client: &dyn TenantClient, range: TimeRange) -> InspectReport {
    let resolver = SchemaResolver::new(client);
    let Some(schema) = resolver.resolve_user_table().await else {
        return InspectReport::unresolved(range);
    };
    let paid_source = resolver.detect_paid_user_source(&schema).await;

    let (total_users, paid_users, new_signups_7d, new_signups_30d, growth_rate) = tokio::join!(
        user_count(client, &schema),
        active_paid_users(client, &schema),
        new_signups(client, &schema, 7),
        new_signups(client, &schema, 30),
        growth_rates(client, &schema),
    );
    let (user_growth, new_users, weekly_active_users) = tokio::join!(
        user_growth_data(client, &schema, range),
        new_users_data(client, &schema, range),
        weekly_active_users(client, &schema, range),
    );

    InspectReport {
        range,
        user_table: Some(schema),
        paid_source,
        total_users,
        paid_users,
        new_signups_7d,
        new_signups_30d,
        growth_rate,
        user_growth,
        new_users,
        weekly_active_users,
    }
}

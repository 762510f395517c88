use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time metrics for one tenant, stored as history separately from
/// the live totals on `TenantConnection`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub total_users: Option<u64>,
    pub paid_users: Option<u64>,
    pub active_users: Option<u64>,
    pub new_signups: u64,
    pub churned_users: Option<u64>,
    pub date: DateTime<Utc>,
}

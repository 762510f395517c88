use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A monitored tenant database as recorded in the system store.
///
/// `total_users` / `paid_users` are the last known totals; they are only
/// written by the refresh service after a successful refresh.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TenantConnection {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub encrypted_secret: Option<String>,
    pub total_users: Option<i64>,
    pub paid_users: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Totals written back after a refresh. `None` leaves the stored value as is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsUpdate {
    pub total_users: Option<u64>,
    pub paid_users: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

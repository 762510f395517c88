use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{MetricSnapshot, MetricsUpdate, TenantConnection};

/// Persistence contract for tenant records and metric history
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn find_tenant(&self, id: Uuid) -> Result<Option<TenantConnection>, DatabaseError>;

    async fn update_tenant_metrics(&self, id: Uuid, update: MetricsUpdate) -> Result<(), DatabaseError>;

    async fn list_all_tenant_ids(&self) -> Result<Vec<Uuid>, DatabaseError>;

    async fn insert_snapshot(&self, id: Uuid, snapshot: &MetricSnapshot) -> Result<(), DatabaseError>;
}

/// `MetricsStore` over the system database
pub struct PgMetricsStore {
    pool: PgPool,
}

impl PgMetricsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn from_main_pool() -> Result<Self, DatabaseError> {
        Ok(Self::new(DatabaseManager::main_pool().await?))
    }
}

fn to_db_count(value: Option<u64>) -> Option<i64> {
    value.map(|v| i64::try_from(v).unwrap_or(i64::MAX))
}

#[async_trait]
impl MetricsStore for PgMetricsStore {
    async fn find_tenant(&self, id: Uuid) -> Result<Option<TenantConnection>, DatabaseError> {
        let tenant = sqlx::query_as::<_, TenantConnection>(
            "SELECT id, name, encrypted_secret, total_users, paid_users, updated_at
             FROM tenant_connections
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    async fn update_tenant_metrics(&self, id: Uuid, update: MetricsUpdate) -> Result<(), DatabaseError> {
        // Unknown metrics keep the last known total; updated_at always advances
        let result = sqlx::query(
            "UPDATE tenant_connections
             SET total_users = COALESCE($2, total_users),
                 paid_users = COALESCE($3, paid_users),
                 updated_at = $4
             WHERE id = $1",
        )
        .bind(id)
        .bind(to_db_count(update.total_users))
        .bind(to_db_count(update.paid_users))
        .bind(update.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("tenant {}", id)));
        }
        Ok(())
    }

    async fn list_all_tenant_ids(&self) -> Result<Vec<Uuid>, DatabaseError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM tenant_connections ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn insert_snapshot(&self, id: Uuid, snapshot: &MetricSnapshot) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO metric_snapshots
             (tenant_id, total_users, paid_users, active_users, new_signups, churned_users, date)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(to_db_count(snapshot.total_users))
        .bind(to_db_count(snapshot.paid_users))
        .bind(to_db_count(snapshot.active_users))
        .bind(to_db_count(Some(snapshot.new_signups)))
        .bind(to_db_count(snapshot.churned_users))
        .bind(snapshot.date)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

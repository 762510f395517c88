use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::client::{with_client, TenantConnector};
use crate::database::credentials::{CredentialError, CredentialResolver};
use crate::database::manager::DatabaseError;
use crate::database::models::{MetricSnapshot, MetricsUpdate, TenantConnection};
use crate::database::store::MetricsStore;
use crate::metrics::paid_users::active_paid_users;
use crate::metrics::snapshot::collect_snapshot;
use crate::metrics::user_count::user_count;
use crate::schema::SchemaResolver;
use crate::services::refresh_cache::RefreshCache;

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("Tenant not found: {0}")]
    TenantNotFound(Uuid),
    #[error("Credential error: {0}")]
    Credentials(#[from] CredentialError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Outcome of refreshing one tenant. Failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshResult {
    pub tenant_id: Uuid,
    pub success: bool,
    pub total_users: Option<u64>,
    pub paid_users: Option<u64>,
    pub error: Option<String>,
    pub cached: bool,
}

impl RefreshResult {
    pub fn success(tenant_id: Uuid, total_users: Option<u64>, paid_users: Option<u64>) -> Self {
        Self {
            tenant_id,
            success: true,
            total_users,
            paid_users,
            error: None,
            cached: false,
        }
    }

    fn from_persisted(tenant: &TenantConnection) -> Self {
        Self {
            cached: true,
            ..Self::success(
                tenant.id,
                tenant.total_users.and_then(|v| u64::try_from(v).ok()),
                tenant.paid_users.and_then(|v| u64::try_from(v).ok()),
            )
        }
    }

    pub fn failure(tenant_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            tenant_id,
            success: false,
            total_users: None,
            paid_users: None,
            error: Some(error.into()),
            cached: false,
        }
    }
}

/// Counts over a `refresh_all` run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RefreshReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cached: usize,
}

impl RefreshReport {
    pub fn from_results(results: &[RefreshResult]) -> Self {
        results.iter().fold(Self::default(), |mut report, r| {
            report.total += 1;
            if r.success {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            if r.cached {
                report.cached += 1;
            }
            report
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotResult {
    pub tenant_id: Uuid,
    pub success: bool,
    pub snapshot: Option<MetricSnapshot>,
    pub error: Option<String>,
}

/// Refreshes tenant metrics, one tenant at a time or in bounded batches.
pub struct RefreshService {
    store: Arc<dyn MetricsStore>,
    resolver: Arc<dyn CredentialResolver>,
    connector: Arc<dyn TenantConnector>,
    cache: Arc<RefreshCache>,
}

impl RefreshService {
    pub fn new(
        store: Arc<dyn MetricsStore>,
        resolver: Arc<dyn CredentialResolver>,
        connector: Arc<dyn TenantConnector>,
        cache: Arc<RefreshCache>,
    ) -> Self {
        Self {
            store,
            resolver,
            connector,
            cache,
        }
    }

    pub fn cache(&self) -> &RefreshCache {
        &self.cache
    }

    /// Refresh total and paid users for one tenant.
    ///
    /// Within the cache TTL (and without `force`) the last persisted totals
    /// are returned and the tenant database is not touched.
    pub async fn refresh_one(&self, tenant_id: Uuid, force: bool) -> RefreshResult {
        let outcome = AssertUnwindSafe(self.try_refresh_one(tenant_id, force))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => {
                info!(
                    "Refreshed tenant {} (total={:?}, paid={:?}, cached={})",
                    tenant_id, result.total_users, result.paid_users, result.cached
                );
                result
            }
            Ok(Err(e)) => {
                warn!("Refresh failed for tenant {}: {}", tenant_id, e);
                RefreshResult::failure(tenant_id, e.to_string())
            }
            Err(_) => {
                warn!("Refresh panicked for tenant {}", tenant_id);
                RefreshResult::failure(tenant_id, "refresh panicked")
            }
        }
    }

    async fn try_refresh_one(&self, tenant_id: Uuid, force: bool) -> Result<RefreshResult, RefreshError> {
        let tenant = self
            .store
            .find_tenant(tenant_id)
            .await?
            .ok_or(RefreshError::TenantNotFound(tenant_id))?;

        if !force && self.cache.was_recently_updated(tenant_id).await {
            debug!("Tenant {} refreshed recently, using stored totals", tenant_id);
            return Ok(RefreshResult::from_persisted(&tenant));
        }

        let credentials = self.resolver.resolve(tenant_id).await?;
        let store = self.store.clone();

        let (total_users, paid_users) = with_client(self.connector.as_ref(), &credentials, |client| async move {
            let client = client.as_ref();
            let (total_users, paid_users) = match SchemaResolver::new(client).resolve_user_table().await {
                Some(schema) => tokio::join!(user_count(client, &schema), active_paid_users(client, &schema)),
                None => {
                    debug!("No user table found for tenant {}", tenant_id);
                    (None, None)
                }
            };

            let update = MetricsUpdate {
                total_users,
                paid_users,
                updated_at: Utc::now(),
            };
            store.update_tenant_metrics(tenant_id, update).await?;
            Ok::<_, RefreshError>((total_users, paid_users))
        })
        .await?;

        self.cache.mark_as_updated(tenant_id).await;
        Ok(RefreshResult::success(tenant_id, total_users, paid_users))
    }

    /// Refresh every tenant, `batch_size` at a time. A batch finishes
    /// completely before the next one starts. Results keep listing order.
    ///
    /// Only the initial tenant listing can fail the whole run.
    pub async fn refresh_all(&self, batch_size: usize, force: bool) -> Result<Vec<RefreshResult>, RefreshError> {
        let tenant_ids = self.store.list_all_tenant_ids().await?;
        let batch_size = batch_size.max(1);
        let mut results = Vec::with_capacity(tenant_ids.len());

        for (index, batch) in tenant_ids.chunks(batch_size).enumerate() {
            debug!("Refreshing batch {} ({} tenants)", index + 1, batch.len());
            let batch_results = join_all(batch.iter().map(|id| self.refresh_one(*id, force))).await;
            results.extend(batch_results);
        }

        let report = RefreshReport::from_results(&results);
        info!(
            "Refreshed {} tenants: {} succeeded, {} failed, {} cached",
            report.total, report.succeeded, report.failed, report.cached
        );
        Ok(results)
    }

    /// Record a full metric snapshot for one tenant. Ignores the refresh cache.
    pub async fn snapshot_one(&self, tenant_id: Uuid) -> SnapshotResult {
        let outcome = AssertUnwindSafe(self.try_snapshot_one(tenant_id))
            .catch_unwind()
            .await;

        let error = match outcome {
            Ok(Ok(snapshot)) => {
                return SnapshotResult {
                    tenant_id,
                    success: true,
                    snapshot: Some(snapshot),
                    error: None,
                }
            }
            Ok(Err(e)) => {
                warn!("Snapshot failed for tenant {}: {}", tenant_id, e);
                e.to_string()
            }
            Err(_) => {
                warn!("Snapshot panicked for tenant {}", tenant_id);
                "snapshot panicked".to_string()
            }
        };

        SnapshotResult {
            tenant_id,
            success: false,
            snapshot: None,
            error: Some(error),
        }
    }

    async fn try_snapshot_one(&self, tenant_id: Uuid) -> Result<MetricSnapshot, RefreshError> {
        self.store
            .find_tenant(tenant_id)
            .await?
            .ok_or(RefreshError::TenantNotFound(tenant_id))?;

        let credentials = self.resolver.resolve(tenant_id).await?;
        let snapshot = with_client(self.connector.as_ref(), &credentials, |client| async move {
            let client = client.as_ref();
            let schema = SchemaResolver::new(client).resolve_user_table().await;
            Ok::<_, RefreshError>(collect_snapshot(client, schema.as_ref()).await)
        })
        .await?;

        self.store.insert_snapshot(tenant_id, &snapshot).await?;
        Ok(snapshot)
    }
}

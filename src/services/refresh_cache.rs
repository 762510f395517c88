use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::config;

/// Remembers when each tenant was last refreshed.
///
/// Purely an optimization: dropping an entry only causes an extra refresh.
pub struct RefreshCache {
    ttl: Duration,
    entries: RwLock<HashMap<Uuid, Instant>>,
}

impl RefreshCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config() -> Self {
        Self::new(config().refresh.cache_ttl())
    }

    /// Fresh while less than `ttl` has passed since the last mark
    pub async fn was_recently_updated(&self, tenant_id: Uuid) -> bool {
        let entries = self.entries.read().await;
        entries
            .get(&tenant_id)
            .map(|marked| marked.elapsed() < self.ttl)
            .unwrap_or(false)
    }

    pub async fn mark_as_updated(&self, tenant_id: Uuid) {
        self.entries.write().await.insert(tenant_id, Instant::now());
    }

    /// Forget one tenant, or every tenant when `tenant_id` is `None`
    pub async fn clear_update_cache(&self, tenant_id: Option<Uuid>) {
        let mut entries = self.entries.write().await;
        match tenant_id {
            Some(id) => {
                entries.remove(&id);
            }
            None => entries.clear(),
        }
    }
}

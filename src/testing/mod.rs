//! In-memory stand-ins for tenant databases and the system store.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::database::client::{SqlParam, SqlRow, SqlValue, TenantClient, TenantConnector};
use crate::database::credentials::Credentials;
use crate::database::manager::DatabaseError;
use crate::database::models::{MetricSnapshot, MetricsUpdate, TenantConnection};
use crate::database::store::MetricsStore;

struct FakeTable {
    schema: String,
    name: String,
    columns: Vec<(String, String)>,
}

struct Rule {
    pattern: String,
    responses: Mutex<VecDeque<Vec<SqlRow>>>,
}

impl Rule {
    fn next(&self) -> Vec<SqlRow> {
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            responses.pop_front().unwrap_or_default()
        } else {
            responses.front().cloned().unwrap_or_default()
        }
    }
}

/// Tenant client answering catalog queries from a fake catalog and metric
/// queries from substring rules. Unmatched SQL fails like a schema mismatch.
pub struct ScriptedClient {
    tables: Vec<FakeTable>,
    rules: Vec<Rule>,
    fail_catalog: bool,
    panic_on: Option<String>,
    queries: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            rules: Vec::new(),
            fail_catalog: false,
            panic_on: None,
            queries: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn with_table(mut self, schema: &str, name: &str, columns: &[(&str, &str)]) -> Self {
        self.tables.push(FakeTable {
            schema: schema.to_string(),
            name: name.to_string(),
            columns: columns.iter().map(|(c, t)| (c.to_string(), t.to_string())).collect(),
        });
        self
    }

    pub fn failing_catalog(mut self) -> Self {
        self.fail_catalog = true;
        self
    }

    /// Panic inside `fetch_all` for SQL containing `pattern`
    pub fn panicking_on(mut self, pattern: &str) -> Self {
        self.panic_on = Some(pattern.to_string());
        self
    }

    pub fn on_rows(mut self, pattern: &str, rows: Vec<SqlRow>) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            responses: Mutex::new(VecDeque::from(vec![rows])),
        });
        self
    }

    pub fn on_count(self, pattern: &str, count: i64) -> Self {
        self.on_counts(pattern, &[count])
    }

    /// Successive matches answer with successive counts; the last one repeats
    pub fn on_counts(mut self, pattern: &str, counts: &[i64]) -> Self {
        let responses = counts
            .iter()
            .map(|c| vec![SqlRow::new(vec![SqlValue::Int(*c)])])
            .collect();
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            responses: Mutex::new(responses),
        });
        self
    }

    pub fn bucket_row(date: &str, value: i64) -> SqlRow {
        SqlRow::new(vec![SqlValue::Text(date.to_string()), SqlValue::Int(value)])
    }

    pub fn text_row(value: &str) -> SqlRow {
        SqlRow::new(vec![SqlValue::Text(value.to_string())])
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn list_tables(&self) -> Vec<SqlRow> {
        let mut tables: Vec<&FakeTable> = self
            .tables
            .iter()
            .filter(|t| t.schema == "public" || t.schema == "auth")
            .collect();
        tables.sort_by(|a, b| (&a.schema, &a.name).cmp(&(&b.schema, &b.name)));
        tables
            .into_iter()
            .map(|t| SqlRow::new(vec![SqlValue::Text(t.schema.clone()), SqlValue::Text(t.name.clone())]))
            .collect()
    }

    fn table_columns(&self, sql: &str, params: &[SqlParam]) -> Vec<SqlRow> {
        let text = |i: usize| match params.get(i) {
            Some(SqlParam::Text(s)) => s.clone(),
            _ => String::new(),
        };
        let (schema, name) = (text(0), text(1));
        let case_insensitive = sql.contains("LOWER(table_name)");

        self.tables
            .iter()
            .filter(|t| {
                if case_insensitive {
                    t.schema.eq_ignore_ascii_case(&schema) && t.name.eq_ignore_ascii_case(&name)
                } else {
                    t.schema == schema && t.name == name
                }
            })
            .flat_map(|t| t.columns.iter())
            .map(|(c, ty)| SqlRow::new(vec![SqlValue::Text(c.clone()), SqlValue::Text(ty.clone())]))
            .collect()
    }
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TenantClient for ScriptedClient {
    async fn fetch_all(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<SqlRow>, DatabaseError> {
        self.queries.lock().unwrap().push(sql.to_string());
        if let Some(pattern) = &self.panic_on {
            if sql.contains(pattern.as_str()) {
                panic!("scripted panic for: {}", sql);
            }
        }

        if sql.contains("information_schema.") {
            if self.fail_catalog {
                return Err(DatabaseError::QueryError("permission denied for schema information_schema".into()));
            }
            if sql.contains("information_schema.tables") {
                return Ok(self.list_tables());
            }
            return Ok(self.table_columns(sql, params));
        }

        self.rules
            .iter()
            .find(|rule| sql.contains(&rule.pattern))
            .map(|rule| rule.next())
            .ok_or_else(|| DatabaseError::QueryError(format!("no scripted response for: {}", sql)))
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector routing by credential host. Tracks how many clients are open
/// at once so batch limits can be asserted.
pub struct ScriptedConnector {
    clients: HashMap<String, Arc<ScriptedClient>>,
    failing: HashSet<String>,
    latency: Option<Duration>,
    connects: AtomicUsize,
    open: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            failing: HashSet::new(),
            latency: None,
            connects: AtomicUsize::new(0),
            open: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_client(mut self, host: &str, client: Arc<ScriptedClient>) -> Self {
        self.clients.insert(host.to_string(), client);
        self
    }

    pub fn failing_host(mut self, host: &str) -> Self {
        self.failing.insert(host.to_string());
        self
    }

    /// Sleep this long inside every successful connect
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn peak_open(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TenantConnector for ScriptedConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn TenantClient>, DatabaseError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&credentials.host) {
            return Err(DatabaseError::ConnectionError(format!(
                "connection to {} timed out",
                credentials.host
            )));
        }
        let inner = self
            .clients
            .get(&credentials.host)
            .cloned()
            .ok_or_else(|| DatabaseError::ConnectionError(format!("unknown host {}", credentials.host)))?;

        let now_open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_open, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        Ok(Arc::new(TrackedClient {
            inner,
            open: self.open.clone(),
        }))
    }
}

struct TrackedClient {
    inner: Arc<ScriptedClient>,
    open: Arc<AtomicUsize>,
}

#[async_trait]
impl TenantClient for TrackedClient {
    async fn fetch_all(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<SqlRow>, DatabaseError> {
        self.inner.fetch_all(sql, params).await
    }

    async fn close(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        self.inner.close().await;
    }
}

/// In-memory `MetricsStore` that keeps insertion order for tenant listing
pub struct MemoryStore {
    tenants: Mutex<Vec<TenantConnection>>,
    updates: Mutex<Vec<(Uuid, MetricsUpdate)>>,
    snapshots: Mutex<Vec<(Uuid, MetricSnapshot)>>,
    failing_updates: Mutex<HashSet<Uuid>>,
    fail_listing: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tenants: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            snapshots: Mutex::new(Vec::new()),
            failing_updates: Mutex::new(HashSet::new()),
            fail_listing: false,
        }
    }

    pub fn failing_listing() -> Self {
        Self { fail_listing: true, ..Self::new() }
    }

    pub fn insert(&self, tenant: TenantConnection) {
        self.tenants.lock().unwrap().push(tenant);
    }

    pub fn fail_updates_for(&self, id: Uuid) {
        self.failing_updates.lock().unwrap().insert(id);
    }

    pub fn get(&self, id: Uuid) -> Option<TenantConnection> {
        self.tenants.lock().unwrap().iter().find(|t| t.id == id).cloned()
    }

    pub fn updates(&self) -> Vec<(Uuid, MetricsUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn snapshots(&self) -> Vec<(Uuid, MetricSnapshot)> {
        self.snapshots.lock().unwrap().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsStore for MemoryStore {
    async fn find_tenant(&self, id: Uuid) -> Result<Option<TenantConnection>, DatabaseError> {
        Ok(self.get(id))
    }

    async fn update_tenant_metrics(&self, id: Uuid, update: MetricsUpdate) -> Result<(), DatabaseError> {
        if self.failing_updates.lock().unwrap().contains(&id) {
            return Err(DatabaseError::QueryError("deadlock detected".into()));
        }

        let mut tenants = self.tenants.lock().unwrap();
        let tenant = tenants
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| DatabaseError::NotFound(format!("tenant {}", id)))?;

        if let Some(total) = update.total_users {
            tenant.total_users = Some(total as i64);
        }
        if let Some(paid) = update.paid_users {
            tenant.paid_users = Some(paid as i64);
        }
        tenant.updated_at = Some(update.updated_at);
        self.updates.lock().unwrap().push((id, update));
        Ok(())
    }

    async fn list_all_tenant_ids(&self) -> Result<Vec<Uuid>, DatabaseError> {
        if self.fail_listing {
            return Err(DatabaseError::ConnectionError("system database unavailable".into()));
        }
        Ok(self.tenants.lock().unwrap().iter().map(|t| t.id).collect())
    }

    async fn insert_snapshot(&self, id: Uuid, snapshot: &MetricSnapshot) -> Result<(), DatabaseError> {
        self.snapshots.lock().unwrap().push((id, snapshot.clone()));
        Ok(())
    }
}

/// Tenant record with a fresh id
pub fn tenant(name: &str, secret: Option<&str>) -> TenantConnection {
    TenantConnection {
        id: Uuid::new_v4(),
        name: name.to_string(),
        encrypted_secret: secret.map(str::to_string),
        total_users: None,
        paid_users: None,
        updated_at: None,
    }
}

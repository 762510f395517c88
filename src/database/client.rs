use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::database::credentials::Credentials;
use crate::database::manager::DatabaseError;

/// Bound parameter for tenant queries
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// Decoded column value. Tenant queries are written so every column is a
/// count, a float or text; anything else decodes as `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow {
    pub values: Vec<SqlValue>,
}

impl SqlRow {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> &SqlValue {
        self.values.get(index).unwrap_or(&SqlValue::Null)
    }

    pub fn get_i64(&self, index: usize) -> Option<i64> {
        match self.get(index) {
            SqlValue::Int(v) => Some(*v),
            SqlValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_str(&self, index: usize) -> Option<&str> {
        match self.get(index) {
            SqlValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Read-only connection to one tenant database.
///
/// A client belongs to exactly one refresh call and is released through
/// [`with_client`].
#[async_trait]
pub trait TenantClient: Send + Sync {
    async fn fetch_all(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<SqlRow>, DatabaseError>;

    /// Release the underlying connections. Must be safe to call once per client.
    async fn close(&self);
}

/// First column of the first row as a count. `Ok(None)` when the query
/// returns no rows or a non-integer value.
pub async fn fetch_count(
    client: &dyn TenantClient,
    sql: &str,
    params: &[SqlParam],
) -> Result<Option<i64>, DatabaseError> {
    let rows = client.fetch_all(sql, params).await?;
    Ok(rows.first().and_then(|row| row.get_i64(0)))
}

/// Opens tenant clients from resolved credentials
#[async_trait]
pub trait TenantConnector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn TenantClient>, DatabaseError>;
}

/// Run `f` with a freshly connected client and close it on every exit path.
///
/// A panic inside `f` still closes the client before it is resumed.
pub async fn with_client<F, Fut, T, E>(
    connector: &dyn TenantConnector,
    credentials: &Credentials,
    f: F,
) -> Result<T, E>
where
    F: FnOnce(Arc<dyn TenantClient>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<DatabaseError>,
{
    let client = connector.connect(credentials).await?;
    let outcome = AssertUnwindSafe(f(client.clone())).catch_unwind().await;
    client.close().await;

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// `sqlx` connector producing a small private pool per tenant refresh
pub struct PgConnector {
    connect_timeout: Duration,
    max_connections: u32,
}

impl PgConnector {
    pub fn new(connect_timeout: Duration, max_connections: u32) -> Self {
        Self {
            connect_timeout,
            max_connections: max_connections.max(1),
        }
    }

    pub fn from_config() -> Self {
        let tenant = &crate::config::config().tenant;
        Self::new(tenant.connect_timeout(), tenant.max_connections)
    }

    fn connect_options(credentials: &Credentials) -> PgConnectOptions {
        credentials
            .connect_options()
            .clone()
            .application_name("tenant-usage-metrics")
            // Session-level guard: every transaction on this connection is read-only
            .options([("default_transaction_read_only", "on"), ("timezone", "UTC")])
    }
}

#[async_trait]
impl TenantConnector for PgConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn TenantClient>, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .connect_with(Self::connect_options(credentials))
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        debug!("Connected to tenant database {}:{}", credentials.host, credentials.port);
        Ok(Arc::new(PgTenantClient { pool }))
    }
}

pub struct PgTenantClient {
    pool: PgPool,
}

impl PgTenantClient {
    fn bind_params<'q>(
        mut q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
        params: &'q [SqlParam],
    ) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
        for p in params {
            q = match p {
                SqlParam::Text(s) => q.bind(s.as_str()),
                SqlParam::Timestamp(t) => q.bind(*t),
            };
        }
        q
    }

    fn decode_row(row: &PgRow) -> SqlRow {
        let values = (0..row.columns().len())
            .map(|i| {
                if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
                    return v.map(SqlValue::Int).unwrap_or(SqlValue::Null);
                }
                if let Ok(v) = row.try_get::<Option<i32>, _>(i) {
                    return v.map(|v| SqlValue::Int(v as i64)).unwrap_or(SqlValue::Null);
                }
                if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
                    return v.map(SqlValue::Float).unwrap_or(SqlValue::Null);
                }
                if let Ok(v) = row.try_get::<Option<String>, _>(i) {
                    return v.map(SqlValue::Text).unwrap_or(SqlValue::Null);
                }
                let column = row.columns()[i].name().to_string();
                warn!("Undecodable column {} in tenant query result", column);
                SqlValue::Null
            })
            .collect();
        SqlRow { values }
    }
}

#[async_trait]
impl TenantClient for PgTenantClient {
    async fn fetch_all(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<SqlRow>, DatabaseError> {
        let rows = Self::bind_params(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(Self::decode_row).collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

pub mod client;
pub mod credentials;
pub mod manager;
pub mod models;
pub mod sql;
pub mod store;

pub use client::{fetch_count, with_client, PgConnector, SqlParam, SqlRow, SqlValue, TenantClient, TenantConnector};
pub use credentials::{CredentialError, CredentialResolver, Credentials, SecretUrlResolver};
pub use manager::{DatabaseError, DatabaseManager};
pub use store::{MetricsStore, PgMetricsStore};

pub mod inspect_service;
pub mod refresh_cache;
pub mod refresh_service;

pub use inspect_service::{inspect_database, InspectReport};
pub use refresh_cache::RefreshCache;
pub use refresh_service::{RefreshError, RefreshReport, RefreshResult, RefreshService, SnapshotResult};

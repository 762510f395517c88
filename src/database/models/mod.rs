pub mod snapshot;
pub mod tenant;

pub use snapshot::MetricSnapshot;
pub use tenant::{MetricsUpdate, TenantConnection};

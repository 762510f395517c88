pub mod catalog;
pub mod heuristics;

pub use catalog::{CatalogIntrospector, ColumnInfo, TableRef};
pub use heuristics::{PaidUserSource, SchemaResolver, UserTableSchema};

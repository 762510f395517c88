//! Identifier quoting for SQL assembled from catalog-discovered names.
//!
//! Table and column names come from the tenant's own catalog, but they are
//! still spliced into SQL text, so every one of them goes through
//! [`quote_identifier`]. Values are always bound as parameters.

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"schema"."table"`
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(table))
}

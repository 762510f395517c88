use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::database::client::{SqlParam, TenantClient};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self { schema: schema.into(), name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

const LIST_TABLES_SQL: &str = "SELECT table_schema::text, table_name::text
     FROM information_schema.tables
     WHERE table_type = 'BASE TABLE' AND table_schema IN ('public', 'auth')
     ORDER BY table_schema, table_name";

const COLUMNS_EXACT_SQL: &str = "SELECT column_name::text, data_type::text
     FROM information_schema.columns
     WHERE table_schema = $1 AND table_name = $2
     ORDER BY ordinal_position";

const COLUMNS_CASE_INSENSITIVE_SQL: &str = "SELECT column_name::text, data_type::text
     FROM information_schema.columns
     WHERE LOWER(table_schema) = LOWER($1) AND LOWER(table_name) = LOWER($2)
     ORDER BY ordinal_position";

/// Read-only view of a tenant database's catalog.
///
/// Query failures yield empty results; an empty list means "unknown", not
/// "the table has no columns".
pub struct CatalogIntrospector<'a> {
    client: &'a dyn TenantClient,
}

impl<'a> CatalogIntrospector<'a> {
    pub fn new(client: &'a dyn TenantClient) -> Self {
        Self { client }
    }

    /// Base tables in the introspected schemas, ordered by schema then name
    pub async fn list_tables(&self) -> Vec<TableRef> {
        match self.client.fetch_all(LIST_TABLES_SQL, &[]).await {
            Ok(rows) => rows
                .iter()
                .filter_map(|row| Some(TableRef::new(row.get_str(0)?, row.get_str(1)?)))
                .collect(),
            Err(e) => {
                debug!("Catalog table listing failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Columns of `schema.table`, exact-case match first, then case-insensitive
    pub async fn get_table_columns(&self, schema: &str, table: &str) -> Vec<ColumnInfo> {
        let columns = self.fetch_columns(COLUMNS_EXACT_SQL, schema, table).await;
        if !columns.is_empty() {
            return columns;
        }
        self.fetch_columns(COLUMNS_CASE_INSENSITIVE_SQL, schema, table).await
    }

    async fn fetch_columns(&self, sql: &str, schema: &str, table: &str) -> Vec<ColumnInfo> {
        let params = [SqlParam::Text(schema.to_string()), SqlParam::Text(table.to_string())];
        match self.client.fetch_all(sql, &params).await {
            Ok(rows) => rows
                .iter()
                .filter_map(|row| {
                    Some(ColumnInfo {
                        name: row.get_str(0)?.to_string(),
                        data_type: row.get_str(1).unwrap_or("unknown").to_string(),
                    })
                })
                .collect(),
            Err(e) => {
                debug!("Column lookup for {}.{} failed: {}", schema, table, e);
                Vec::new()
            }
        }
    }
}

use crate::database::client::TenantClient;
use crate::database::sql::{qualified_table, quote_identifier};
use crate::metrics::{first_count, QueryVariant};
use crate::schema::{PaidUserSource, SchemaResolver, UserTableSchema};

/// Status values on a subscription-like table that count as paying
pub const PAID_STATUS_VALUES: &[&str] = &["active", "paid"];

/// Number of users carrying the paid signal; `None` when there is no signal
/// or no query shape fits the tenant's column types.
pub async fn get_active_paid_users(client: &dyn TenantClient) -> Option<u64> {
    let schema = SchemaResolver::new(client).resolve_user_table().await?;
    active_paid_users(client, &schema).await
}

pub async fn active_paid_users(client: &dyn TenantClient, schema: &UserTableSchema) -> Option<u64> {
    let source = SchemaResolver::new(client).detect_paid_user_source(schema).await?;
    first_count(client, paid_user_variants(schema, &source)).await
}

pub fn paid_user_variants(schema: &UserTableSchema, source: &PaidUserSource) -> Vec<QueryVariant> {
    match source {
        PaidUserSource::Column { name } => {
            let table = schema.qualified_name();
            let col = quote_identifier(name);
            vec![
                QueryVariant::new("boolean-flag", format!("SELECT COUNT(*) FROM {} WHERE {} = true", table, col), vec![]),
                QueryVariant::new("integer-flag", format!("SELECT COUNT(*) FROM {} WHERE {}::integer = 1", table, col), vec![]),
                // Any value other than "free" counts as paid, so "trial" or "cancelled" are included
                QueryVariant::new(
                    "text-not-free",
                    format!(
                        "SELECT COUNT(*) FROM {table} WHERE {col} IS NOT NULL \
                         AND LOWER(TRIM({col}::text)) NOT IN ('free', '')",
                        table = table,
                        col = col,
                    ),
                    vec![],
                ),
            ]
        }
        PaidUserSource::Table { schema: table_schema, name, user_id_column, status_column } => {
            let table = qualified_table(table_schema, name);
            let user_col = quote_identifier(user_id_column);
            let mut variants = Vec::new();

            if let Some(status) = status_column {
                let status = quote_identifier(status);
                let paid_values = PAID_STATUS_VALUES
                    .iter()
                    .map(|v| format!("'{}'", v))
                    .collect::<Vec<_>>()
                    .join(", ");
                // boolean::text is 'true', so the text comparison would count nothing
                variants.push(QueryVariant::new(
                    "status-boolean",
                    format!("SELECT COUNT(DISTINCT {}) FROM {} WHERE {} = true", user_col, table, status),
                    vec![],
                ));
                variants.push(QueryVariant::new(
                    "status-text",
                    format!(
                        "SELECT COUNT(DISTINCT {}) FROM {} WHERE LOWER({}::text) IN ({})",
                        user_col, table, status, paid_values
                    ),
                    vec![],
                ));
            }

            variants.push(QueryVariant::new(
                "any-row",
                format!("SELECT COUNT(DISTINCT {}) FROM {}", user_col, table),
                vec![],
            ));
            variants
        }
    }
}

use crate::database::client::TenantClient;
use crate::metrics::{first_count, QueryVariant};
use crate::schema::{SchemaResolver, UserTableSchema};

/// Row count of the tenant's user table; `None` without a user table
pub async fn get_user_count(client: &dyn TenantClient) -> Option<u64> {
    let schema = SchemaResolver::new(client).resolve_user_table().await?;
    user_count(client, &schema).await
}

pub async fn user_count(client: &dyn TenantClient, schema: &UserTableSchema) -> Option<u64> {
    first_count(client, user_count_variants(schema)).await
}

pub fn user_count_variants(schema: &UserTableSchema) -> Vec<QueryVariant> {
    vec![QueryVariant::new(
        "count",
        format!("SELECT COUNT(*) FROM {}", schema.qualified_name()),
        vec![],
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClient;

    #[tokio::test]
    async fn counts_resolved_user_table() {
        let client = ScriptedClient::new()
            .with_table("public", "users", &[("id", "integer"), ("created_at", "timestamp")])
            .on_count("SELECT COUNT(*) FROM \"public\".\"users\"", 1234);

        assert_eq!(get_user_count(&client).await, Some(1234));
    }

    #[tokio::test]
    async fn unknown_without_user_table() {
        let client = ScriptedClient::new().with_table("public", "orders", &[("id", "integer")]);
        assert_eq!(get_user_count(&client).await, None);
    }
}

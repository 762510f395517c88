use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::database::client::TenantClient;
use crate::database::sql::qualified_table;
use crate::schema::catalog::{CatalogIntrospector, ColumnInfo, TableRef};

// Candidate lists are scanned in order and the first hit wins. All names are
// compared lowercased, so "createdAt" matches "createdat".

/// User-table names tried in "public", most conventional first
pub const USER_TABLE_CANDIDATES: &[&str] = &[
    "users",
    "user",
    "accounts",
    "account",
    "customers",
    "customer",
    "members",
    "member",
    "profiles",
    "app_users",
];

pub const ID_COLUMNS: &[&str] = &["id", "user_id"];

pub const CREATED_AT_COLUMNS: &[&str] = &[
    "created_at",
    "createdat",
    "created",
    "date_created",
    "inserted_at",
    "date_joined",
];

pub const UPDATED_AT_COLUMNS: &[&str] = &[
    "updated_at",
    "updatedat",
    "updated",
    "date_updated",
    "modified_at",
    "last_modified",
];

pub const DELETED_AT_COLUMNS: &[&str] = &["deleted_at", "deletedat", "deleted", "date_deleted", "removed_at"];

pub const LAST_ACTIVE_COLUMNS: &[&str] = &[
    "last_active_at",
    "lastactiveat",
    "last_active",
    "lastactive",
    "last_seen_at",
    "last_seen",
    "last_login_at",
    "lastloginat",
    "last_login",
    "last_sign_in_at",
];

pub const PAID_FLAG_COLUMNS: &[&str] = &[
    "is_paid",
    "ispaid",
    "subscription_status",
    "subscriptionstatus",
    "plan",
    "plan_type",
    "plantype",
];

pub const PAID_TABLE_FRAGMENTS: &[&str] = &["subscription", "payment", "paying_user"];

pub const USER_REFERENCE_COLUMNS: &[&str] = &[
    "user_id",
    "userid",
    "customer_id",
    "customerid",
    "account_id",
    "accountid",
];

pub const STATUS_COLUMNS: &[&str] = &["status", "subscription_status", "state"];

/// Resolved layout of a tenant's user table. Re-derived on every refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTableSchema {
    pub table_name: String,
    pub schema: String,
    pub id_column: String,
    pub created_at_column: String,
    pub updated_at_column: Option<String>,
    pub deleted_at_column: Option<String>,
    pub last_active_column: Option<String>,
}

impl UserTableSchema {
    /// Quoted `"schema"."table"` for SQL assembly
    pub fn qualified_name(&self) -> String {
        qualified_table(&self.schema, &self.table_name)
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef::new(&self.schema, &self.table_name)
    }

    /// Column that records user activity: last-active if present, else updated-at
    pub fn activity_column(&self) -> Option<&str> {
        self.last_active_column
            .as_deref()
            .or(self.updated_at_column.as_deref())
    }
}

/// Where the "paid" signal lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaidUserSource {
    Column {
        name: String,
    },
    Table {
        schema: String,
        name: String,
        user_id_column: String,
        status_column: Option<String>,
    },
}

/// Case-insensitive column lookup preserving catalog order
struct ColumnMap<'c> {
    columns: &'c [ColumnInfo],
    by_lower: HashMap<String, &'c ColumnInfo>,
}

impl<'c> ColumnMap<'c> {
    fn new(columns: &'c [ColumnInfo]) -> Self {
        let mut by_lower = HashMap::new();
        for column in columns {
            by_lower.entry(column.name.to_lowercase()).or_insert(column);
        }
        Self { columns, by_lower }
    }

    /// First candidate present in the table, in candidate order
    fn find(&self, candidates: &[&str]) -> Option<&'c ColumnInfo> {
        candidates.iter().find_map(|c| self.by_lower.get(*c).copied())
    }

    fn find_name(&self, candidates: &[&str]) -> Option<String> {
        self.find(candidates).map(|c| c.name.clone())
    }

    /// Case-sensitive variant of [`find`](Self::find)
    fn find_exact(&self, candidates: &[&str]) -> Option<&'c ColumnInfo> {
        candidates
            .iter()
            .find_map(|c| self.columns.iter().find(|column| column.name == *c))
    }

    fn first(&self) -> Option<&'c ColumnInfo> {
        self.columns.first()
    }
}

/// Infers user-table semantics from the live catalog. Never writes.
pub struct SchemaResolver<'a> {
    catalog: CatalogIntrospector<'a>,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(client: &'a dyn TenantClient) -> Self {
        Self {
            catalog: CatalogIntrospector::new(client),
        }
    }

    /// Locate the user table: canonical names in "public", then "auth.users".
    pub async fn find_user_table(&self) -> Option<TableRef> {
        self.resolve_user_table().await.map(|schema| schema.table_ref())
    }

    /// Like [`find_user_table`](Self::find_user_table) but returns the full
    /// resolved column mapping of the accepted table.
    pub async fn resolve_user_table(&self) -> Option<UserTableSchema> {
        let tables = self.catalog.list_tables().await;
        let public: Vec<&TableRef> = tables.iter().filter(|t| t.schema == "public").collect();

        for candidate in USER_TABLE_CANDIDATES {
            // Exact spelling before other casings of the same name
            let exact = public.iter().filter(|t| t.name == *candidate);
            let folded = public
                .iter()
                .filter(|t| t.name != *candidate && t.name.eq_ignore_ascii_case(candidate));

            for table in exact.chain(folded) {
                if let Some(schema) = self.detect_user_table_schema(&table.schema, &table.name).await {
                    debug!("Resolved user table {}.{}", schema.schema, schema.table_name);
                    return Some(schema);
                }
                debug!("Rejected {}.{}: no created-at column", table.schema, table.name);
            }
        }

        let fallback = self.detect_user_table_schema("auth", "users").await;
        if fallback.is_none() {
            debug!("No user table found");
        }
        fallback
    }

    /// Map a table's columns onto the user-table roles. `None` only when no
    /// created-at column can be found.
    pub async fn detect_user_table_schema(&self, schema: &str, table: &str) -> Option<UserTableSchema> {
        let columns = self.catalog.get_table_columns(schema, table).await;
        Self::user_table_schema_from_columns(schema, table, &columns)
    }

    fn user_table_schema_from_columns(
        schema: &str,
        table: &str,
        columns: &[ColumnInfo],
    ) -> Option<UserTableSchema> {
        let map = ColumnMap::new(columns);

        let created_at_column = map.find_name(CREATED_AT_COLUMNS)?;
        let id_column = map.find_exact(ID_COLUMNS).or_else(|| map.first())?.name.clone();

        Some(UserTableSchema {
            table_name: table.to_string(),
            schema: schema.to_string(),
            id_column,
            created_at_column,
            updated_at_column: map.find_name(UPDATED_AT_COLUMNS),
            deleted_at_column: map.find_name(DELETED_AT_COLUMNS),
            last_active_column: map.find_name(LAST_ACTIVE_COLUMNS),
        })
    }

    /// Find the paid-user signal: a flag column on the user table, else the
    /// first subscription/payment-like table that references users.
    pub async fn detect_paid_user_source(&self, user_table: &UserTableSchema) -> Option<PaidUserSource> {
        let columns = self
            .catalog
            .get_table_columns(&user_table.schema, &user_table.table_name)
            .await;

        if let Some(name) = ColumnMap::new(&columns).find_name(PAID_FLAG_COLUMNS) {
            debug!("Paid signal: column {}", name);
            return Some(PaidUserSource::Column { name });
        }

        let user_ref = user_table.table_ref();
        for table in self.catalog.list_tables().await {
            if table == user_ref || !is_paid_table_name(&table.name) {
                continue;
            }

            let columns = self.catalog.get_table_columns(&table.schema, &table.name).await;
            let map = ColumnMap::new(&columns);
            let Some(user_id_column) = map.find_name(USER_REFERENCE_COLUMNS) else {
                continue;
            };

            debug!("Paid signal: table {}.{}", table.schema, table.name);
            return Some(PaidUserSource::Table {
                schema: table.schema,
                name: table.name,
                user_id_column,
                status_column: map.find_name(STATUS_COLUMNS),
            });
        }

        None
    }
}

fn is_paid_table_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    PAID_TABLE_FRAGMENTS.iter().any(|fragment| lower.contains(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClient;

    fn cols(names: &[&str]) -> Vec<ColumnInfo> {
        names
            .iter()
            .map(|n| ColumnInfo { name: n.to_string(), data_type: "text".to_string() })
            .collect()
    }

    #[test]
    fn created_at_spellings_resolve_to_same_role() {
        for spelling in ["created_at", "createdAt", "CREATED", "date_created", "Created_At"] {
            let schema =
                SchemaResolver::user_table_schema_from_columns("public", "users", &cols(&["id", spelling]))
                    .unwrap_or_else(|| panic!("{} not recognised", spelling));
            assert_eq!(schema.created_at_column, spelling);
        }
    }

    #[test]
    fn missing_created_at_rejects_table() {
        let schema = SchemaResolver::user_table_schema_from_columns(
            "public",
            "users",
            &cols(&["id", "email", "updated_at"]),
        );
        assert!(schema.is_none());
    }

    #[test]
    fn id_falls_back_to_first_column_and_optionals_resolve() {
        let schema = SchemaResolver::user_table_schema_from_columns(
            "public",
            "members",
            &cols(&["member_uuid", "email", "createdAt", "updatedAt", "deleted_at", "last_seen_at"]),
        )
        .unwrap();

        assert_eq!(schema.id_column, "member_uuid");
        assert_eq!(schema.updated_at_column.as_deref(), Some("updatedAt"));
        assert_eq!(schema.deleted_at_column.as_deref(), Some("deleted_at"));
        assert_eq!(schema.activity_column(), Some("last_seen_at"));
    }

    #[test]
    fn id_synonyms_match_exactly() {
        let schema = SchemaResolver::user_table_schema_from_columns(
            "public",
            "users",
            &cols(&["uuid", "ID", "User_Id", "created_at"]),
        )
        .unwrap();
        assert_eq!(schema.id_column, "uuid");
    }

    #[test]
    fn first_synonym_in_list_order_wins() {
        let schema = SchemaResolver::user_table_schema_from_columns(
            "public",
            "users",
            &cols(&["user_id", "created", "id", "created_at"]),
        )
        .unwrap();
        assert_eq!(schema.id_column, "id");
        assert_eq!(schema.created_at_column, "created_at");
    }

    #[test]
    fn activity_column_falls_back_to_updated_at() {
        let schema = SchemaResolver::user_table_schema_from_columns(
            "public",
            "users",
            &cols(&["id", "created_at", "updated_at"]),
        )
        .unwrap();
        assert_eq!(schema.activity_column(), Some("updated_at"));
    }

    #[tokio::test]
    async fn finds_canonical_user_table() {
        let client = ScriptedClient::new()
            .with_table("public", "orders", &[("id", "integer"), ("created_at", "timestamp")])
            .with_table("public", "customers", &[("id", "integer"), ("created_at", "timestamp")]);

        let table = SchemaResolver::new(&client).find_user_table().await;
        assert_eq!(table, Some(TableRef::new("public", "customers")));
    }

    #[tokio::test]
    async fn name_match_without_created_at_is_rejected() {
        let client = ScriptedClient::new()
            .with_table("public", "users", &[("id", "integer"), ("email", "text")])
            .with_table("public", "accounts", &[("id", "integer"), ("date_created", "timestamp")]);

        let table = SchemaResolver::new(&client).find_user_table().await;
        assert_eq!(table, Some(TableRef::new("public", "accounts")));

        let only_users =
            ScriptedClient::new().with_table("public", "users", &[("id", "integer"), ("email", "text")]);
        assert_eq!(SchemaResolver::new(&only_users).find_user_table().await, None);
    }

    #[tokio::test]
    async fn matches_table_names_case_insensitively() {
        let client = ScriptedClient::new().with_table("public", "User", &[("id", "text"), ("createdAt", "timestamp")]);

        let schema = SchemaResolver::new(&client).resolve_user_table().await.unwrap();
        assert_eq!(schema.table_name, "User");
        assert_eq!(schema.qualified_name(), "\"public\".\"User\"");
    }

    #[tokio::test]
    async fn falls_back_to_auth_users() {
        let client = ScriptedClient::new()
            .with_table("public", "posts", &[("id", "integer"), ("created_at", "timestamp")])
            .with_table("auth", "users", &[("id", "uuid"), ("created_at", "timestamptz"), ("last_sign_in_at", "timestamptz")]);

        let schema = SchemaResolver::new(&client).resolve_user_table().await.unwrap();
        assert_eq!(schema.schema, "auth");
        assert_eq!(schema.last_active_column.as_deref(), Some("last_sign_in_at"));
    }

    #[tokio::test]
    async fn paid_column_takes_precedence_over_subscription_table() {
        let client = ScriptedClient::new()
            .with_table("public", "users", &[("id", "integer"), ("created_at", "timestamp"), ("plan", "text")])
            .with_table("public", "subscriptions", &[("id", "integer"), ("user_id", "integer"), ("status", "text")]);
        let resolver = SchemaResolver::new(&client);
        let users = resolver.resolve_user_table().await.unwrap();

        assert_eq!(
            resolver.detect_paid_user_source(&users).await,
            Some(PaidUserSource::Column { name: "plan".to_string() })
        );
    }

    #[tokio::test]
    async fn paid_table_requires_user_reference() {
        let client = ScriptedClient::new()
            .with_table("public", "users", &[("id", "integer"), ("created_at", "timestamp")])
            .with_table("public", "payment_methods", &[("id", "integer"), ("brand", "text")])
            .with_table("public", "subscriptions", &[("id", "integer"), ("customer_id", "integer"), ("state", "text")]);
        let resolver = SchemaResolver::new(&client);
        let users = resolver.resolve_user_table().await.unwrap();

        assert_eq!(
            resolver.detect_paid_user_source(&users).await,
            Some(PaidUserSource::Table {
                schema: "public".to_string(),
                name: "subscriptions".to_string(),
                user_id_column: "customer_id".to_string(),
                status_column: Some("state".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn no_paid_signal_yields_none() {
        let client = ScriptedClient::new()
            .with_table("public", "users", &[("id", "integer"), ("created_at", "timestamp")]);
        let resolver = SchemaResolver::new(&client);
        let users = resolver.resolve_user_table().await.unwrap();

        assert_eq!(resolver.detect_paid_user_source(&users).await, None);
    }
}

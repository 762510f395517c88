use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tenant_usage_metrics::database::{Credentials, PgConnector};

pub const TEST_DATABASE_ENV: &str = "TENANT_TEST_DATABASE_URL";

/// Scratch tenant database used by the live tests
pub struct TenantDatabase {
    pub url: String,
    pub credentials: Credentials,
    pub connector: PgConnector,
}

impl TenantDatabase {
    /// `None` when no scratch database is configured; callers skip quietly
    pub fn from_env() -> Result<Option<Self>> {
        dotenvy::dotenv().ok();
        let Ok(url) = std::env::var(TEST_DATABASE_ENV) else {
            eprintln!("{} not set, skipping live tenant test", TEST_DATABASE_ENV);
            return Ok(None);
        };

        let credentials = Credentials::from_url(&url).context("invalid TENANT_TEST_DATABASE_URL")?;
        Ok(Some(Self {
            url,
            credentials,
            connector: PgConnector::new(Duration::from_secs(10), 2),
        }))
    }

    /// Writable pool for fixture setup. Tenant clients themselves are read-only.
    pub async fn admin_pool(&self) -> Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&self.url)
            .await
            .context("failed to connect to scratch tenant database")?;
        Ok(pool)
    }
}

/// Recreate `public.users` in a camelCase, text-plan layout:
/// three users created 60 days ago, two created 3 days ago (both on a paid
/// plan, one signed in today).
pub async fn seed_users(pool: &PgPool) -> Result<()> {
    for statement in [
        "DROP TABLE IF EXISTS public.users CASCADE",
        r#"CREATE TABLE public.users (
            id SERIAL PRIMARY KEY,
            "createdAt" TIMESTAMPTZ NOT NULL,
            plan TEXT,
            last_sign_in_at TIMESTAMPTZ
        )"#,
        r#"INSERT INTO public.users ("createdAt", plan, last_sign_in_at) VALUES
            (now() - interval '60 days', 'free', NULL),
            (now() - interval '60 days', 'free', NULL),
            (now() - interval '60 days', NULL, NULL),
            (now() - interval '3 days', 'pro', now()),
            (now() - interval '3 days', 'team', NULL)"#,
    ] {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

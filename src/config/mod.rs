use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub tenant: TenantDbConfig,
    pub refresh: RefreshConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// System database holding tenant records and snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
}

/// Connections opened against tenant-owned databases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantDbConfig {
    pub connect_timeout_secs: u64,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub batch_size: usize,
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl TenantDbConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl RefreshConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Tenant database overrides
        if let Ok(v) = env::var("TENANT_CONNECT_TIMEOUT_SECS") {
            self.tenant.connect_timeout_secs = v.parse().unwrap_or(self.tenant.connect_timeout_secs);
        }
        if let Ok(v) = env::var("TENANT_MAX_CONNECTIONS") {
            self.tenant.max_connections = v.parse().unwrap_or(self.tenant.max_connections);
        }

        // Refresh overrides
        if let Ok(v) = env::var("REFRESH_BATCH_SIZE") {
            self.refresh.batch_size = v.parse().unwrap_or(self.refresh.batch_size);
        }
        if let Ok(v) = env::var("REFRESH_CACHE_TTL_SECS") {
            self.refresh.cache_ttl_secs = v.parse().unwrap_or(self.refresh.cache_ttl_secs);
        }

        if let Ok(v) = env::var("LOG_LEVEL") {
            self.logging.level = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
            },
            tenant: TenantDbConfig {
                connect_timeout_secs: 10,
                max_connections: 2,
            },
            refresh: RefreshConfig {
                batch_size: 5,
                cache_ttl_secs: 5 * 60,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
            },
            tenant: TenantDbConfig {
                connect_timeout_secs: 10,
                max_connections: 2,
            },
            refresh: RefreshConfig {
                batch_size: 5,
                cache_ttl_secs: 5 * 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
            },
            tenant: TenantDbConfig {
                connect_timeout_secs: 5,
                max_connections: 2,
            },
            refresh: RefreshConfig {
                batch_size: 5,
                cache_ttl_secs: 15 * 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

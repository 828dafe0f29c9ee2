use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub tenancy: TenancyConfig,
    pub quota: QuotaSettings,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub enable_query_logging: bool,
    pub slow_query_threshold_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Namespace token prepended to every organization schema name
    pub schema_prefix: String,
    /// Schema holding the organizations registry, audit log and quota tables
    pub shared_schema: String,
    pub max_limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaSettings {
    /// Used for organizations without a quota config row
    pub default_daily_limit: i64,
    pub warning_percent: i64,
    /// Sync jobs paused longer ago than this stay paused across a daily reset
    pub resume_grace_hours: i64,
    pub reset_tick_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            schema_prefix: "org_".to_string(),
            shared_schema: "public".to_string(),
            max_limit: Some(1000),
        }
    }
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            default_daily_limit: 10_000,
            warning_percent: 80,
            resume_grace_hours: 25,
            reset_tick_secs: 60,
        }
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
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECT_TIMEOUT") {
            self.database.connect_timeout_secs = v.parse().unwrap_or(self.database.connect_timeout_secs);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }
        if let Ok(v) = env::var("DATABASE_SLOW_QUERY_THRESHOLD_MS") {
            self.database.slow_query_threshold_ms = v.parse().unwrap_or(self.database.slow_query_threshold_ms);
        }

        // Tenancy overrides
        if let Ok(v) = env::var("TENANCY_SCHEMA_PREFIX") {
            self.tenancy.schema_prefix = v;
        }
        if let Ok(v) = env::var("TENANCY_SHARED_SCHEMA") {
            self.tenancy.shared_schema = v;
        }
        if let Ok(v) = env::var("TENANCY_MAX_LIMIT") {
            self.tenancy.max_limit = v.parse().ok();
        }

        // Quota overrides
        if let Ok(v) = env::var("QUOTA_DEFAULT_DAILY_LIMIT") {
            self.quota.default_daily_limit = v.parse().unwrap_or(self.quota.default_daily_limit);
        }
        if let Ok(v) = env::var("QUOTA_WARNING_PERCENT") {
            self.quota.warning_percent = v.parse().unwrap_or(self.quota.warning_percent);
        }
        if let Ok(v) = env::var("QUOTA_RESUME_GRACE_HOURS") {
            self.quota.resume_grace_hours = v.parse().unwrap_or(self.quota.resume_grace_hours);
        }
        if let Ok(v) = env::var("QUOTA_RESET_TICK_SECS") {
            self.quota.reset_tick_secs = v.parse().unwrap_or(self.quota.reset_tick_secs);
        }

        // API overrides
        if let Some(port) = env::var("API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_ENABLE_CORS") {
            self.api.enable_cors = v.parse().unwrap_or(self.api.enable_cors);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connect_timeout_secs: 30,
                enable_query_logging: true,
                slow_query_threshold_ms: 100,
            },
            tenancy: TenancyConfig::default(),
            quota: QuotaSettings {
                reset_tick_secs: 30,
                ..QuotaSettings::default()
            },
            api: ApiConfig {
                port: 3000,
                enable_cors: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connect_timeout_secs: 10,
                enable_query_logging: true,
                slow_query_threshold_ms: 500,
            },
            tenancy: TenancyConfig {
                max_limit: Some(500),
                ..TenancyConfig::default()
            },
            quota: QuotaSettings::default(),
            api: ApiConfig {
                port: 3000,
                enable_cors: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connect_timeout_secs: 5,
                enable_query_logging: false,
                slow_query_threshold_ms: 1000,
            },
            tenancy: TenancyConfig {
                max_limit: Some(250),
                ..TenancyConfig::default()
            },
            quota: QuotaSettings::default(),
            api: ApiConfig {
                port: 3000,
                enable_cors: false,
            },
        }
    }
}

// Global config for the binaries - library services take their sections explicitly
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

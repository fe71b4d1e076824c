//! Service configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use certledger_core::Network;
use certledger_mirror::RetryPolicy;

/// Which datastore backs the transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Process-local map. Nothing survives a restart.
    #[default]
    Memory,
    /// PostgreSQL at `DATABASE_URL`.
    Postgres,
    /// Embedded `RocksDB` under `DATA_DIR` (feature `rocksdb-backend`).
    Rocksdb,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "rocksdb" => Ok(Self::Rocksdb),
            other => Err(format!("unknown store backend: {other}")),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
            Self::Rocksdb => "rocksdb",
        })
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Ledger network whose mirror is queried (default: testnet).
    pub network: Network,

    /// Mirror base URL override for private mirrors.
    pub mirror_base_url: Option<String>,

    /// Datastore backend (default: memory).
    pub store_backend: StoreBackend,

    /// PostgreSQL connection string.
    pub database_url: Option<String>,

    /// Maximum PostgreSQL pool size.
    pub database_max_connections: u32,

    /// Path to the `RocksDB` data directory (default: "/data/certledger").
    pub data_dir: String,

    /// Service API key for recovery and topic endpoints.
    pub service_api_key: Option<String>,

    /// HS256 secret for user tokens. User endpoints reject everything when unset.
    pub auth_jwt_secret: Option<String>,

    /// Expected JWT audience (default: "authenticated").
    pub auth_audience: String,

    /// Seconds between scheduled sweeps; 0 disables the scheduler.
    pub sweep_interval_seconds: u64,

    /// Records per scheduled sweep.
    pub sweep_limit: usize,

    /// Mirror polling budget for reconciliation.
    pub reconcile_max_retries: u32,

    /// Delay between reconciliation polls in milliseconds.
    pub reconcile_retry_delay_ms: u64,

    /// How long shutdown waits for pending confirmations.
    pub shutdown_grace_seconds: u64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds. Recovery endpoints are exempt.
    pub request_timeout_seconds: u64,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Unparseable values fall back to their defaults with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            network: parsed_var("LEDGER_NETWORK").unwrap_or(defaults.network),
            mirror_base_url: std::env::var("MIRROR_BASE_URL").ok(),
            store_backend: parsed_var("STORE_BACKEND").unwrap_or(defaults.store_backend),
            database_url: std::env::var("DATABASE_URL").ok(),
            database_max_connections: parsed_var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            auth_jwt_secret: std::env::var("AUTH_JWT_SECRET").ok(),
            auth_audience: std::env::var("AUTH_AUDIENCE").unwrap_or(defaults.auth_audience),
            sweep_interval_seconds: parsed_var("SWEEP_INTERVAL_SECONDS")
                .unwrap_or(defaults.sweep_interval_seconds),
            sweep_limit: parsed_var("SWEEP_LIMIT").unwrap_or(defaults.sweep_limit),
            reconcile_max_retries: parsed_var("RECONCILE_MAX_RETRIES")
                .unwrap_or(defaults.reconcile_max_retries),
            reconcile_retry_delay_ms: parsed_var("RECONCILE_RETRY_DELAY_MS")
                .unwrap_or(defaults.reconcile_retry_delay_ms),
            shutdown_grace_seconds: parsed_var("SHUTDOWN_GRACE_SECONDS")
                .unwrap_or(defaults.shutdown_grace_seconds),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| parse_origins(&s))
                .unwrap_or(defaults.cors_origins),
            max_body_bytes: parsed_var("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: parsed_var("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
        }
    }

    /// Polling budget handed to the reconciler.
    #[must_use]
    pub fn reconcile_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.reconcile_max_retries,
            Duration::from_millis(self.reconcile_retry_delay_ms),
        )
    }

    /// Interval of the sweep scheduler, if enabled.
    #[must_use]
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_seconds > 0).then(|| Duration::from_secs(self.sweep_interval_seconds))
    }

    /// Grace period for pending confirmations on shutdown.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            network: Network::Testnet,
            mirror_base_url: None,
            store_backend: StoreBackend::Memory,
            database_url: None,
            database_max_connections: 10,
            data_dir: "/data/certledger".into(),
            service_api_key: None,
            auth_jwt_secret: None,
            auth_audience: "authenticated".into(),
            sweep_interval_seconds: 300,
            sweep_limit: 50,
            reconcile_max_retries: 15,
            reconcile_retry_delay_ms: 2000,
            shutdown_grace_seconds: 10,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024, // 1MB
            request_timeout_seconds: 30,
        }
    }
}

/// Read and parse an environment variable, warning on garbage.
fn parsed_var<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(var = name, value = %raw, error = %e, "Ignoring invalid configuration value");
            None
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

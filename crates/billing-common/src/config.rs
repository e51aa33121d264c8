//! Configuration loading utilities.
//!
//! This module provides layered configuration loading using figment:
//! - Default values (compiled in)
//! - Configuration file (TOML)
//! - Environment variables
//!
//! # Example
//!
//! ```rust,ignore
//! use billing_common::config::{BillingCoreConfig, load_config};
//!
//! let config: BillingCoreConfig = load_config("billing", None)?;
//! ```

#[cfg(feature = "config")]
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// PostgreSQL connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_database_url() -> String {
    "postgres://localhost/billing_core".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub json_logs: bool,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "billing-core".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
        }
    }
}

/// Tunables for the billing core's own business logic (not ambient infra).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BillingCoreConfig {
    /// Default `due_date` offset in days for `send_invoice` collection, when the caller
    /// does not supply one.
    #[serde(default = "default_due_days")]
    pub default_due_days: i64,

    /// TTL, in seconds, that idempotency keys should be considered authoritative for
    /// (repository-enforced uniqueness still applies regardless of this window; this only
    /// bounds how long callers are expected to retry with the same key).
    #[serde(default = "default_idempotency_ttl_secs")]
    pub idempotency_ttl_secs: u64,

    /// Page size used by default when a repository `List` call has no caller-specified
    /// limit.
    #[serde(default = "default_list_page_size")]
    pub default_list_page_size: u32,
}

fn default_due_days() -> i64 {
    30
}

fn default_idempotency_ttl_secs() -> u64 {
    86_400
}

fn default_list_page_size() -> u32 {
    100
}

impl Default for BillingCoreConfig {
    fn default() -> Self {
        Self {
            default_due_days: default_due_days(),
            idempotency_ttl_secs: default_idempotency_ttl_secs(),
            default_list_page_size: default_list_page_size(),
        }
    }
}

/// Complete billing-core configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub billing: BillingCoreConfig,
}

/// Load configuration from layered sources.
///
/// Sources (in order of precedence): defaults, then an optional TOML file, then
/// environment variables prefixed with the uppercase `prefix` followed by `_`. For
/// example, with prefix "billing", `BILLING_DATABASE_URL` sets `database.url`.
#[cfg(feature = "config")]
pub fn load_config<T: Default + Serialize + for<'de> Deserialize<'de>>(
    prefix: &str,
    config_file: Option<&str>,
) -> Result<T, figment::Error> {
    let mut figment = Figment::new().merge(Serialized::defaults(T::default()));

    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed(&format!("{}_", prefix.to_uppercase())).split("_"));

    figment.extract()
}

/// Load the complete application configuration from defaults, file, and environment.
#[cfg(feature = "config")]
pub fn load_app_config(config_file: Option<&str>) -> Result<AppConfig, figment::Error> {
    load_config("billing", config_file)
}

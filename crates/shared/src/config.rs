//! Application configuration management.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtSettings,
    /// Billing engine tunables.
    #[serde(default)]
    pub billing: BillingConfig,
    /// Ledger currency and fallback exchange rates.
    #[serde(default)]
    pub currency: CurrencyConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for a single request, including all storage calls.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    15
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Timeout for establishing a new connection.
    #[serde(default = "default_db_timeout")]
    pub connect_timeout_secs: u64,
    /// Timeout for acquiring a pooled connection.
    #[serde(default = "default_db_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_db_timeout() -> u64 {
    5
}

/// JWT configuration as read from config sources.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for verifying tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

/// Billing engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Divisor turning cm³ into volumetric kilograms.
    #[serde(default = "default_volumetric_divisor")]
    pub volumetric_divisor: Decimal,
    /// Allowed drift between a submitted total and the recomputed one.
    #[serde(default = "default_total_tolerance")]
    pub total_tolerance: Decimal,
    /// Decimal places used when projecting amounts for display.
    #[serde(default = "default_display_precision")]
    pub display_precision: u32,
    /// Give up retrying a failed parcel release after this many milliseconds.
    #[serde(default = "default_release_retry_ms")]
    pub release_retry_max_elapsed_ms: u64,
}

fn default_volumetric_divisor() -> Decimal {
    Decimal::from(5000)
}

fn default_total_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

fn default_display_precision() -> u32 {
    2
}

fn default_release_retry_ms() -> u64 {
    2000
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            volumetric_divisor: default_volumetric_divisor(),
            total_tolerance: default_total_tolerance(),
            display_precision: default_display_precision(),
            release_retry_max_elapsed_ms: default_release_retry_ms(),
        }
    }
}

/// Currency configuration.
///
/// `rates` is the documented fallback used when a tenant has no stored
/// rate for a currency: units of that currency per 1 unit of `ledger_currency`.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyConfig {
    /// Ledger currency for tenants that do not override it.
    #[serde(default = "default_ledger_currency")]
    pub ledger_currency: String,
    /// Fallback rate table.
    #[serde(default)]
    pub rates: HashMap<String, Decimal>,
}

fn default_ledger_currency() -> String {
    "USD".to_string()
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            ledger_currency: default_ledger_currency(),
            rates: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("FREIGHTBILL").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_billing_defaults() {
        let billing = BillingConfig::default();
        assert_eq!(billing.volumetric_divisor, dec!(5000));
        assert_eq!(billing.total_tolerance, dec!(0.01));
        assert_eq!(billing.display_precision, 2);
    }

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("FREIGHTBILL__SERVER__PORT", Some("9090")),
                ("FREIGHTBILL__DATABASE__URL", Some("postgres://localhost/fb")),
                ("FREIGHTBILL__JWT__SECRET", Some("s3cret")),
                ("FREIGHTBILL__CURRENCY__LEDGER_CURRENCY", Some("AED")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.server.port, 9090);
                assert_eq!(config.server.request_timeout_secs, 15);
                assert_eq!(config.database.url, "postgres://localhost/fb");
                assert_eq!(config.currency.ledger_currency, "AED");
                assert_eq!(config.billing.volumetric_divisor, dec!(5000));
            },
        );
    }
}

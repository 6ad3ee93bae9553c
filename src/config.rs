use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::payments::BackUrls;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_GATEWAY_BASE_URL: &str = "https://api.mercadopago.com";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CURRENCY: &str = "ARS";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;

/// Payment gateway settings
#[derive(Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// REST base URL of the payment provider
    #[serde(default = "default_gateway_base_url")]
    #[validate(url)]
    pub base_url: String,

    /// Provider access token. Loaded from the environment or a secret-mounted
    /// config file; never defaulted.
    #[validate(length(min = 1, message = "gateway access token is required"))]
    pub access_token: String,

    /// Public URL the provider calls back with payment notifications
    #[serde(default)]
    pub notification_url: Option<String>,

    /// Upper bound for every outbound provider call
    #[serde(default = "default_gateway_timeout_secs")]
    #[validate(range(min = 1, max = 60))]
    pub timeout_secs: u64,

    /// ISO currency used for preference items
    #[serde(default = "default_currency")]
    #[validate(length(min = 3, max = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,

    /// Shared secret for verifying `x-signature` on inbound webhooks
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Maximum accepted age of a signed webhook
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: u64,
}

// Hand-written so the access token never reaches the logs.
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &"<redacted>")
            .field("notification_url", &self.notification_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("currency", &self.currency)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .finish()
    }
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
            notification_url: None,
            timeout_secs: default_gateway_timeout_secs(),
            currency: default_currency(),
            webhook_secret: None,
            webhook_tolerance_secs: default_webhook_tolerance_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Public storefront URL; checkout back URLs hang off it
    #[validate(url)]
    pub public_url: String,

    /// Reject checkouts that carry no user identity
    #[serde(default)]
    pub require_auth_for_checkout: bool,

    /// Payment gateway settings
    #[validate]
    pub gateway: GatewayConfig,
}

impl AppConfig {
    /// Creates a new configuration with defaults for everything optional
    pub fn new(
        database_url: String,
        host: String,
        port: u16,
        environment: String,
        public_url: String,
        gateway: GatewayConfig,
    ) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            public_url,
            require_auth_for_checkout: false,
            gateway,
        }
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Success/failure/pending return pages for the hosted checkout
    pub fn back_urls(&self) -> BackUrls {
        let base = self.public_url.trim_end_matches('/');
        BackUrls {
            success: format!("{}/checkout-success", base),
            failure: format!("{}/checkout-failure", base),
            pending: format!("{}/checkout-pending", base),
        }
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !self.is_development() && self.gateway.notification_url.is_none() {
            let mut err = ValidationError::new("notification_url_required");
            err.message = Some(
                "Set APP__GATEWAY__NOTIFICATION_URL so the payment provider can deliver webhooks"
                    .into(),
            );
            errors.add("gateway", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_gateway_base_url() -> String {
    DEFAULT_GATEWAY_BASE_URL.to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_SECS
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_webhook_tolerance_secs() -> u64 {
    DEFAULT_WEBHOOK_TOLERANCE_SECS
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

fn build_config(run_env: &str, config_dir: &Path) -> Result<Config, ConfigError> {
    let dir = config_dir.to_string_lossy();
    Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("public_url", "http://localhost:5173")?
        .add_source(File::with_name(&format!("{}/default", dir)).required(false))
        .add_source(File::with_name(&format!("{}/{}", dir, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. `config/default.toml`
/// 3. Environment-specific config (`config/{env}.toml`)
/// 4. Environment variables (`APP__*`, nested with `__`)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] with an explicit config directory.
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = build_config(&run_env, config_dir)?;

    if config.get_string("gateway.access_token").is_err() {
        error!("Payment gateway access token is not configured. Set APP__GATEWAY__ACCESS_TOKEN.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "gateway.access_token is required but not configured".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "production".into(),
            "https://shop.example.com/".into(),
            GatewayConfig::new("https://api.mercadopago.com", "TEST-token"),
        )
    }

    #[test]
    fn non_dev_requires_cors_origins_and_notification_url() {
        let cfg = base_config();
        let errors = cfg.validate_additional_constraints().unwrap_err();
        assert!(errors.field_errors().contains_key("cors_allowed_origins"));
        assert!(errors.field_errors().contains_key("gateway"));
    }

    #[test]
    fn non_dev_with_origins_and_webhook_passes() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://shop.example.com".into());
        cfg.gateway.notification_url = Some("https://api.example.com/webhook/payment".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn back_urls_are_derived_from_public_url() {
        let urls = base_config().back_urls();
        assert_eq!(urls.success, "https://shop.example.com/checkout-success");
        assert_eq!(urls.failure, "https://shop.example.com/checkout-failure");
        assert_eq!(urls.pending, "https://shop.example.com/checkout-pending");
    }

    #[test]
    fn gateway_timeout_is_bounded() {
        let mut cfg = base_config();
        cfg.gateway.timeout_secs = 0;
        assert!(cfg.validate().is_err());
        cfg.gateway.timeout_secs = 120;
        assert!(cfg.validate().is_err());
        cfg.gateway.timeout_secs = 5;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let mut gateway = GatewayConfig::new("https://api.mercadopago.com", "APP_USR-secret");
        gateway.webhook_secret = Some("whsec".into());
        let rendered = format!("{:?}", gateway);
        assert!(!rendered.contains("APP_USR-secret"));
        assert!(!rendered.contains("whsec"));
    }

    #[test]
    fn loads_layered_file_config() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            r#"
            database_url = "sqlite::memory:"
            public_url = "https://shop.example.com"

            [gateway]
            access_token = "TEST-123"
            timeout_secs = 4
            "#
        )
        .unwrap();

        let config = build_config("development", dir.path()).unwrap();
        let cfg: AppConfig = config.try_deserialize().unwrap();
        assert_eq!(cfg.gateway.access_token, "TEST-123");
        assert_eq!(cfg.gateway.timeout(), Duration::from_secs(4));
        assert_eq!(cfg.gateway.currency, "ARS");
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert!(cfg.validate().is_ok());
    }
}

//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `RAZORPAY_KEY_ID` - Payment gateway key id
//! - `RAZORPAY_KEY_SECRET` - Payment gateway key secret (also the signature key)
//! - `S3_BUCKET` - Bucket for uploaded product images
//! - `AWS_REGION` - Region of the bucket
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `APP_ENV` - `production`, `staging` or `development` (default: production)
//! - `STOREFRONT_TRUST_PROXY_HEADERS` - Key rate limits on `cf-connecting-ip`,
//!   `x-real-ip`, `fly-client-ip` and `x-forwarded-for` (default: false). Only
//!   enable behind a proxy that overwrites them.
//! - `RAZORPAY_API_BASE` - Gateway API base URL (default: <https://api.razorpay.com>)
//! - `GATEWAY_TIMEOUT_SECS` - Per-request gateway timeout (default: 10)
//! - `CHECKOUT_PRICE_TOLERANCE_MINOR` - Allowed drift between client and server totals (default: 100)
//! - `S3_ENDPOINT` - Custom S3-compatible endpoint (`MinIO`, R2)
//! - `S3_PUBLIC_BASE_URL` - Public URL prefix for uploaded objects
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_GATEWAY_API_BASE: &str = "https://api.razorpay.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Deployment environment.
///
/// Anything that is not explicitly `development` or `staging` is treated as
/// production, so a typo never unlocks development behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Production,
    Staging,
    Development,
}

impl AppEnv {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Self::Development,
            "staging" => Self::Staging,
            _ => Self::Production,
        }
    }

    /// Returns true for production deployments.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Deployment environment
    pub app_env: AppEnv,
    /// Take the client address from proxy headers instead of the TCP peer
    pub trust_proxy_headers: bool,
    /// Payment gateway configuration
    pub gateway: GatewayConfig,
    /// Checkout pricing rules
    pub checkout: CheckoutConfig,
    /// Object storage configuration
    pub storage: StorageConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
    /// Fraction of error events sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Payment gateway configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct GatewayConfig {
    /// API base URL, without trailing slash
    pub api_base: String,
    /// Public key id (sent to the browser checkout widget)
    pub key_id: String,
    /// Key secret, used for API auth and payment signatures
    pub key_secret: SecretString,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Checkout pricing rules.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutConfig {
    /// Maximum accepted difference, in minor units, between the amount the
    /// client submits and the total computed from the catalog.
    pub price_tolerance_minor: i64,
}

/// S3 object storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores
    pub endpoint: Option<String>,
    /// Prefix for public object URLs; defaults to the virtual-hosted S3 URL
    pub public_base_url: Option<String>,
}

impl StorageConfig {
    /// Public URL for an object key.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{key}", base.trim_end_matches('/')),
            None => match &self.endpoint {
                Some(endpoint) => {
                    format!("{}/{}/{key}", endpoint.trim_end_matches('/'), self.bucket)
                }
                None => format!(
                    "https://{}.s3.{}.amazonaws.com/{key}",
                    self.bucket, self.region
                ),
            },
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        let app_env = get_optional_env("APP_ENV")
            .map(|v| AppEnv::parse(&v))
            .unwrap_or_default();

        let trust_proxy_headers = parse_env("STOREFRONT_TRUST_PROXY_HEADERS", "false")?;

        let gateway = GatewayConfig::from_env()?;
        let checkout = CheckoutConfig {
            price_tolerance_minor: parse_env("CHECKOUT_PRICE_TOLERANCE_MINOR", "100")?,
        };
        let storage = StorageConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            app_env,
            trust_proxy_headers,
            gateway,
            checkout,
            storage,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether checkout may proceed without a logged-in user.
    #[must_use]
    pub const fn allows_guest_checkout(&self) -> bool {
        !self.app_env.is_production()
    }
}

impl GatewayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs: u64 = parse_env("GATEWAY_TIMEOUT_SECS", "10")?;
        Ok(Self {
            api_base: get_env_or_default("RAZORPAY_API_BASE", DEFAULT_GATEWAY_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            key_id: get_required_env("RAZORPAY_KEY_ID")?,
            key_secret: get_required_secret("RAZORPAY_KEY_SECRET")?,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bucket: get_required_env("S3_BUCKET")?,
            region: get_required_env("AWS_REGION")?,
            endpoint: get_optional_env("S3_ENDPOINT"),
            public_base_url: get_optional_env("S3_PUBLIC_BASE_URL"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Config suitable for unit tests; never touches the environment.
    pub(crate) fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/marigold_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            app_env: AppEnv::Production,
            trust_proxy_headers: false,
            gateway: GatewayConfig {
                api_base: "http://127.0.0.1:9".to_string(),
                key_id: "rzp_test_key".to_string(),
                key_secret: SecretString::from("gateway_signing_key"),
                timeout: Duration::from_secs(1),
            },
            checkout: CheckoutConfig {
                price_tolerance_minor: 100,
            },
            storage: StorageConfig {
                bucket: "marigold-media".to_string(),
                region: "ap-south-1".to_string(),
                endpoint: None,
                public_base_url: None,
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-session-key-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_app_env_fails_closed() {
        assert_eq!(AppEnv::parse("development"), AppEnv::Development);
        assert_eq!(AppEnv::parse("Staging"), AppEnv::Staging);
        assert_eq!(AppEnv::parse("prod"), AppEnv::Production);
        assert_eq!(AppEnv::parse("develop"), AppEnv::Production);
        assert_eq!(AppEnv::parse(""), AppEnv::Production);
    }

    #[test]
    fn test_guest_checkout_only_outside_production() {
        let mut config = test_config();
        assert!(!config.allows_guest_checkout());
        config.app_env = AppEnv::Staging;
        assert!(config.allows_guest_checkout());
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_gateway_config_debug_redacts_secret() {
        let config = test_config();
        let debug_output = format!("{:?}", config.gateway);
        assert!(debug_output.contains("rzp_test_key"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("gateway_signing_key"));
    }

    #[test]
    fn test_public_url_variants() {
        let mut storage = test_config().storage;
        assert_eq!(
            storage.public_url("products/a.png"),
            "https://marigold-media.s3.ap-south-1.amazonaws.com/products/a.png"
        );

        storage.endpoint = Some("http://localhost:9000/".to_string());
        assert_eq!(
            storage.public_url("products/a.png"),
            "http://localhost:9000/marigold-media/products/a.png"
        );

        storage.public_base_url = Some("https://cdn.example.in/".to_string());
        assert_eq!(
            storage.public_url("products/a.png"),
            "https://cdn.example.in/products/a.png"
        );
    }
}

//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_TOKEN_SECRET` - Bearer token signing secret (min 32 chars, high entropy)
//! - `SHOPFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`; not needed with `SHOPFRONT_STORAGE=memory`)
//!
//! ## Optional
//! - `SHOPFRONT_STORAGE` - `postgres` (default) or `memory`
//! - `SHOPFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOPFRONT_PORT` - Listen port (default: 5000)
//! - `SHOPFRONT_TOKEN_TTL_HOURS` - Bearer token lifetime (default: 168, one week)
//! - `SHOPFRONT_PRICE_TOLERANCE` - Allowed difference between client-submitted and
//!   catalog prices at checkout (default: 0.01)
//! - `SHOPFRONT_CORS_ORIGINS` - Comma-separated allowed origins (default: any)
//! - `SHOPFRONT_CATALOG_CACHE_SECS` - Product name cache TTL (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

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

/// Where orders, carts and users are persisted.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// `PostgreSQL` (production).
    Postgres {
        /// Connection string (contains password)
        database_url: SecretString,
    },
    /// Process-local maps; data is lost on restart.
    Memory,
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Storage backend
    pub storage: StorageConfig,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Bearer token signing secret
    pub token_secret: SecretString,
    /// Bearer token lifetime
    pub token_ttl: Duration,
    /// Maximum accepted drift between client and catalog prices
    pub price_tolerance: Decimal,
    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,
    /// TTL of the product display-name cache
    pub catalog_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl ServerConfig {
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

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ServerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let storage = match env.or_default("SHOPFRONT_STORAGE", "postgres").as_str() {
            "postgres" => StorageConfig::Postgres {
                database_url: env.database_url("SHOPFRONT_DATABASE_URL")?,
            },
            "memory" => StorageConfig::Memory,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "SHOPFRONT_STORAGE".to_string(),
                    format!("expected 'postgres' or 'memory', got '{other}'"),
                ));
            }
        };

        let host = env.parsed("SHOPFRONT_HOST", "127.0.0.1")?;
        let port = env.parsed("SHOPFRONT_PORT", "5000")?;

        let token_secret = env.validated_secret("SHOPFRONT_TOKEN_SECRET")?;
        validate_secret_length(&token_secret, "SHOPFRONT_TOKEN_SECRET")?;

        let token_ttl_hours: u64 = env.parsed("SHOPFRONT_TOKEN_TTL_HOURS", "168")?;
        let price_tolerance: Decimal = env.parsed("SHOPFRONT_PRICE_TOLERANCE", "0.01")?;
        if price_tolerance.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_PRICE_TOLERANCE".to_string(),
                "must not be negative".to_string(),
            ));
        }
        let cache_secs: u64 = env.parsed("SHOPFRONT_CATALOG_CACHE_SECS", "300")?;

        let cors_origins = env
            .optional("SHOPFRONT_CORS_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_default();

        Ok(Self {
            storage,
            host,
            port,
            token_secret,
            token_ttl: Duration::from_secs(token_ttl_hours.saturating_mul(3600)),
            price_tolerance,
            cors_origins,
            catalog_cache_ttl: Duration::from_secs(cache_secs),
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Load configuration from a fixed map (tests and tooling).
    ///
    /// # Errors
    ///
    /// Same as [`ServerConfig::from_env`].
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Database URL with fallback to generic `DATABASE_URL`.
    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }

    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
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
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
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

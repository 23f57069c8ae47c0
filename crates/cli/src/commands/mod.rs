//! Subcommand implementations.

pub mod migrate;
pub mod seed;
pub mod user;

use secrecy::SecretString;
use thiserror::Error;

use shopfront_server::db::RepositoryError;
use shopfront_server::services::AuthError;

/// Errors shared by all commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository operation failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Account operation failed.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Input file could not be read.
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Input file is not valid YAML for the expected shape.
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Input parsed but failed validation.
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Unknown role name.
    #[error("Invalid role: {0}. Valid roles: customer, admin")]
    InvalidRole(String),
}

/// Database URL from `SHOPFRONT_DATABASE_URL`, falling back to `DATABASE_URL`.
pub fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("SHOPFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("SHOPFRONT_DATABASE_URL"))
}

//! Seed the product catalog from a YAML file.
//!
//! # File Format
//!
//! ```yaml
//! products:
//!   - id: 1b9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed
//!     name: Desk Lamp
//!     price: 49.99
//!     image: /images/lamp.jpg
//!     category: Lighting
//!     description: Adjustable arm, warm white.
//! ```
//!
//! Products are upserted by `id`, so a file can be applied repeatedly.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use shopfront_server::db::{self, CatalogRepository, Store};
use shopfront_server::models::Product;

use super::{CommandError, database_url};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    products: Vec<Product>,
}

/// Parse and validate a catalog document.
///
/// # Errors
///
/// Returns `CommandError::Yaml` for malformed input and
/// `CommandError::InvalidCatalog` for empty names or duplicate IDs.
pub fn parse_catalog(content: &str) -> Result<Vec<Product>, CommandError> {
    let file: CatalogFile = serde_yaml::from_str(content)?;

    let mut seen = HashSet::new();
    for product in &file.products {
        if product.name.trim().is_empty() {
            return Err(CommandError::InvalidCatalog(format!(
                "product {} has an empty name",
                product.id
            )));
        }
        if !seen.insert(product.id) {
            return Err(CommandError::InvalidCatalog(format!(
                "duplicate product id {}",
                product.id
            )));
        }
    }

    Ok(file.products)
}

/// Upsert the products in `file_path`.
///
/// # Arguments
///
/// * `file_path` - Path to the YAML catalog
/// * `clear_existing` - Delete every product first
///
/// # Errors
///
/// Returns an error if the file is invalid or a database operation fails.
pub async fn catalog(file_path: &str, clear_existing: bool) -> Result<(), CommandError> {
    let content = tokio::fs::read_to_string(Path::new(file_path))
        .await
        .map_err(|source| CommandError::Io {
            path: file_path.to_string(),
            source,
        })?;

    // Validate before touching the database
    let products = parse_catalog(&content)?;
    info!(path = %file_path, products = products.len(), "Catalog file validated");

    let pool = db::create_pool(&database_url()?).await?;
    info!("Connected to database");

    if clear_existing {
        let deleted = sqlx::query("DELETE FROM shopfront.products")
            .execute(&pool)
            .await?
            .rows_affected();
        info!(deleted, "Cleared existing products");
    }

    let store = Store::postgres(pool);
    for product in &products {
        store.catalog.upsert(product).await?;
    }

    info!("Seeding complete!");
    info!("  Products upserted: {}", products.len());
    Ok(())
}

//! Product catalog reads.
//!
//! Order views need a display name for every product line. Names are cached
//! with `moka` for the configured TTL; prices are never served from the cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use shopfront_core::ProductId;

use crate::db::{CatalogRepository, RepositoryError};
use crate::models::Product;

/// Display name for a product that is no longer in the catalog.
pub const PRODUCT_PLACEHOLDER: &str = "Product unavailable";

/// Catalog access with a product-name cache.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogServiceInner>,
}

struct CatalogServiceInner {
    catalog: Arc<dyn CatalogRepository>,
    names: Cache<ProductId, String>,
}

impl CatalogService {
    /// Create a catalog service whose name cache expires after `ttl`.
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogRepository>, ttl: Duration) -> Self {
        let names = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .build();

        Self {
            inner: Arc::new(CatalogServiceInner { catalog, names }),
        }
    }

    /// All products, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        self.inner.catalog.list().await
    }

    /// One product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.inner.catalog.get(id).await
    }

    /// Current catalog entries for these IDs, keyed by ID. Bypasses the cache.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn current(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, RepositoryError> {
        let products = self.inner.catalog.get_many(ids).await?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }

    /// Display names for these IDs.
    ///
    /// Unknown products map to [`PRODUCT_PLACEHOLDER`] and are not cached, so
    /// a product added later shows up on the next read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn names(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, String>, RepositoryError> {
        let mut names = HashMap::new();
        let mut misses = Vec::new();

        for &id in ids {
            if names.contains_key(&id) || misses.contains(&id) {
                continue;
            }
            match self.inner.names.get(&id).await {
                Some(name) => {
                    names.insert(id, name);
                }
                None => misses.push(id),
            }
        }

        if !misses.is_empty() {
            debug!(count = misses.len(), "Product name cache miss");
            for product in self.inner.catalog.get_many(&misses).await? {
                self.inner
                    .names
                    .insert(product.id, product.name.clone())
                    .await;
                names.insert(product.id, product.name);
            }
            for id in misses {
                names
                    .entry(id)
                    .or_insert_with(|| PRODUCT_PLACEHOLDER.to_string());
            }
        }

        Ok(names)
    }

    /// Drop all cached names.
    pub async fn invalidate_all(&self) {
        self.inner.names.invalidate_all();
        self.inner.names.run_pending_tasks().await;
    }
}

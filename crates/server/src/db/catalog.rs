//! Product catalog repository.
//!
//! The API only reads the catalog. Writes come from `sf-cli seed catalog`.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use shopfront_core::{Price, ProductId};

use super::RepositoryError;
use crate::models::Product;

/// Storage for catalog products.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Get a product by ID.
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Get every product whose ID is in `ids`. Unknown IDs are skipped.
    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    /// All products, by name.
    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Insert or replace a product.
    async fn upsert(&self, product: &Product) -> Result<(), RepositoryError>;
}

/// `PostgreSQL` catalog repository.
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    price: Price,
    image: String,
    category: Option<String>,
    description: Option<String>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            price: row.price,
            image: row.image,
            category: row.category,
            description: row.description,
        }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, price, image, category, description
            FROM shopfront.products
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, price, image, category, description
            FROM shopfront.products
            WHERE id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, price, image, category, description
            FROM shopfront.products
            ORDER BY name, id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn upsert(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shopfront.products (id, name, price, image, category, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                price = EXCLUDED.price,
                image = EXCLUDED.image,
                category = EXCLUDED.category,
                description = EXCLUDED.description,
                updated_at = NOW()
            ",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.price)
        .bind(&product.image)
        .bind(&product.category)
        .bind(&product.description)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

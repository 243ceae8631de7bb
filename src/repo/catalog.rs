use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Product;

/// Read-only view of the product catalog. Order placement only needs the
/// name and offer price to snapshot a line item.
#[derive(Clone)]
pub struct CatalogRepo {
    pool: PgPool,
}

impl CatalogRepo {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn find_by_id(&self, product_id: Uuid) -> Result<Product, sqlx::Error> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_one(&self.pool)
            .await
    }
}

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Address;

#[derive(Clone)]
pub struct AddressRepo {
    pool: PgPool,
}

impl AddressRepo {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    /// Resolves an address id, scoped to its owner so one customer cannot
    /// ship to another customer's saved address.
    pub async fn find_owned(
        &self,
        address_id: Uuid,
        user_id: Uuid,
    ) -> Result<Address, sqlx::Error> {
        sqlx::query_as::<_, Address>("SELECT * FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(address_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }
}

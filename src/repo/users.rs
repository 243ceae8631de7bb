use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{MembershipTier, PointsEntry, User};

#[derive(Clone)]
pub struct UserRepo {
    pool: PgPool,
}

impl UserRepo {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }

    /// Row-locked load for ledger mutations: the duplicate-award scan and the
    /// subsequent append must see a stable ledger.
    pub async fn find_for_update(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_one(conn)
            .await
    }

    /// Writes back the points fields as one unit so the balance, the monotone
    /// counters and the ledger never diverge.
    pub async fn save_points(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        points: i64,
        total_points_earned: i64,
        total_points_redeemed: i64,
        points_history: &[PointsEntry],
        membership_tier: MembershipTier,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET
                points = $1,
                total_points_earned = $2,
                total_points_redeemed = $3,
                points_history = $4,
                membership_tier = $5,
                updated_at = NOW()
            WHERE id = $6
            "#,
        )
        .bind(points)
        .bind(total_points_earned)
        .bind(total_points_redeemed)
        .bind(Json(points_history))
        .bind(membership_tier)
        .bind(user_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Clears the stored cart after a confirmed online payment.
    pub async fn clear_cart(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET cart_items = '{}', updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{
    Address, Order, OrderItem, OrderStatus, PaymentMethod, RefundStatus, TimelineEntry,
};

/// Fields needed to create an order. Everything else starts at its default
/// (`Order Placed`, unpaid, empty tracking fields).
pub struct NewOrder {
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub amount: Decimal,
    pub address: Address,
    pub payment_method: PaymentMethod,
    pub timeline: Vec<TimelineEntry>,
}

#[derive(Clone)]
pub struct OrderRepo {
    pool: PgPool,
}

impl OrderRepo {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn insert(&self, new: NewOrder) -> Result<Order, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (customer_id, items, amount, address, payment_method, timeline)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new.customer_id)
        .bind(Json(new.items))
        .bind(new.amount)
        .bind(Json(new.address))
        .bind(new.payment_method)
        .bind(Json(new.timeline))
        .fetch_one(&self.pool)
        .await
    }

    pub async fn find_by_id(&self, order_id: Uuid) -> Result<Order, sqlx::Error> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_one(&self.pool)
            .await
    }

    /// Row-locked load used inside a status-transition transaction so
    /// concurrent transitions serialize on the order row.
    pub async fn find_for_update(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
    ) -> Result<Order, sqlx::Error> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_one(conn)
            .await
    }

    /// Persists a status transition. Meta fields merge via COALESCE so an
    /// omitted field never clears a previously stored value.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_transition(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        status: OrderStatus,
        timeline: &[TimelineEntry],
        tracking_number: Option<&str>,
        delivery_partner: Option<&str>,
        estimated_delivery: Option<DateTime<Utc>>,
        actual_delivery: Option<DateTime<Utc>>,
    ) -> Result<Order, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET
                status = $1,
                timeline = $2,
                tracking_number = COALESCE($3, tracking_number),
                delivery_partner = COALESCE($4, delivery_partner),
                estimated_delivery = COALESCE($5, estimated_delivery),
                actual_delivery = COALESCE($6, actual_delivery),
                updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(Json(timeline))
        .bind(tracking_number)
        .bind(delivery_partner)
        .bind(estimated_delivery)
        .bind(actual_delivery)
        .bind(order_id)
        .fetch_one(conn)
        .await
    }

    pub async fn mark_paid(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        timeline: &[TimelineEntry],
    ) -> Result<Order, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET is_paid = TRUE, timeline = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(Json(timeline))
        .bind(order_id)
        .fetch_one(conn)
        .await
    }

    pub async fn set_return_requested(
        &self,
        order_id: Uuid,
        reason: &str,
        refund_status: RefundStatus,
        timeline: &[TimelineEntry],
    ) -> Result<Order, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET
                return_requested = TRUE,
                return_reason = $1,
                refund_status = $2,
                timeline = $3,
                updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(reason)
        .bind(refund_status)
        .bind(Json(timeline))
        .bind(order_id)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn delete(&self, order_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// A customer's orders, newest first. Unpaid online orders are still
    /// awaiting the payment webhook and are not listed.
    pub async fn list_for_user(&self, customer_id: Uuid) -> Result<Vec<Order>, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE customer_id = $1 AND (payment_method = 'COD' OR is_paid = TRUE)
            ORDER BY created_at DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn list_all(&self) -> Result<Vec<Order>, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE payment_method = 'COD' OR is_paid = TRUE
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Lifetime spend across a customer's delivered orders, the input to the
    /// membership-tier recompute.
    pub async fn delivered_total_for_user(
        &self,
        conn: &mut PgConnection,
        customer_id: Uuid,
    ) -> Result<Decimal, sqlx::Error> {
        let total: Option<Decimal> = sqlx::query_scalar(
            "SELECT SUM(amount) FROM orders WHERE customer_id = $1 AND status = 'Delivered'",
        )
        .bind(customer_id)
        .fetch_one(conn)
        .await?;
        Ok(total.unwrap_or_default())
    }

    pub async fn delivered_total(&self, customer_id: Uuid) -> Result<Decimal, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        self.delivered_total_for_user(&mut conn, customer_id).await
    }
}

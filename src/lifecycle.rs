//! Order lifecycle manager: owns the status state machine, the append-only
//! timeline and the side effects of each transition.
//!
//! The transition itself is applied to an in-memory [`Order`] by a pure
//! function; the manager wraps that with a row-locked load, a single
//! persisting UPDATE and, for deliveries, the points award inside the same
//! database transaction (the award runs under a savepoint so an award
//! failure is logged without reverting the status change).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::{Acquire, PgPool};
use uuid::Uuid;

use crate::awards::PointsService;
use crate::error::ApiError;
use crate::models::{
    AuthUser, Order, OrderItem, OrderStatus, PaymentMethod, PlaceOrderRequest, RefundStatus,
    StatusMeta, TimelineEntry,
};
use crate::notifier::OrderNotifier;
use crate::payments::{CheckoutLineItem, PaymentClient, SessionMetadata};
use crate::points::order_total_with_tax;
use crate::repo::{AddressRepo, CatalogRepo, OrderRepo, UserRepo};
use crate::repo::orders::NewOrder;

const PLACED_DESCRIPTION: &str = "Your order has been successfully placed";
const PLACED_LOCATION: &str = "GreenCart Warehouse";

/// Whether `from -> to` is a legal status transition. `Delivered`,
/// `Cancelled` and `Returned` are terminal here; the return flow mutates
/// delivered orders through its own operation, not through this table.
pub fn transition_allowed(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (OrderPlaced, Confirmed)
            | (OrderPlaced, Cancelled)
            | (Confirmed, Processing)
            | (Confirmed, Cancelled)
            | (Processing, Shipped)
            | (Processing, Cancelled)
            | (Shipped, OutForDelivery)
            | (Shipped, Cancelled)
            | (OutForDelivery, Delivered)
    )
}

/// Fixed customer-facing description for a status, used for timeline entries.
pub fn status_description(status: OrderStatus) -> String {
    match status {
        OrderStatus::OrderPlaced => PLACED_DESCRIPTION.to_string(),
        OrderStatus::Confirmed => "Your order has been confirmed and is being prepared".into(),
        OrderStatus::Processing => "Your order is being processed and packed".into(),
        OrderStatus::Shipped => "Your order has been shipped and is on its way".into(),
        OrderStatus::OutForDelivery => "Your order is out for delivery".into(),
        OrderStatus::Delivered => "Your order has been delivered successfully".into(),
        OrderStatus::Cancelled => "Your order has been cancelled".into(),
        other => format!("Order status updated to {other}"),
    }
}

/// Side effects owed after a transition has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionEffects {
    /// Set on the first transition into `Delivered` only.
    pub award_points: bool,
}

/// Applies a validated transition to the order in memory: status, merged
/// meta fields, the appended timeline entry and (on first delivery) the
/// actual-delivery timestamp. Meta fields merge; `None` never clears.
pub fn apply_transition(
    order: &mut Order,
    new_status: OrderStatus,
    meta: &StatusMeta,
    now: DateTime<Utc>,
) -> Result<TransitionEffects, ApiError> {
    let previous = order.status;
    if !transition_allowed(previous, new_status) {
        return Err(ApiError::Validation(format!(
            "invalid status transition: {previous} -> {new_status}"
        )));
    }

    order.status = new_status;

    if let Some(tracking) = &meta.tracking_number {
        order.tracking_number = Some(tracking.clone());
    }
    if let Some(partner) = &meta.delivery_partner {
        order.delivery_partner = Some(partner.clone());
    }
    if let Some(eta) = meta.estimated_delivery {
        order.estimated_delivery = Some(eta);
    }

    let mut effects = TransitionEffects::default();
    if new_status == OrderStatus::Delivered && previous != OrderStatus::Delivered {
        order.actual_delivery = Some(now);
        effects.award_points = true;
    }

    order.timeline.push(TimelineEntry {
        status: new_status.as_str().to_string(),
        description: status_description(new_status),
        timestamp: now,
        location: meta.location.clone(),
    });

    Ok(effects)
}

#[derive(Clone)]
pub struct OrderLifecycle {
    pool: PgPool,
    orders: OrderRepo,
    users: UserRepo,
    catalog: CatalogRepo,
    addresses: AddressRepo,
    points: PointsService,
    payments: PaymentClient,
    notifier: Arc<dyn OrderNotifier>,
}

impl OrderLifecycle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        orders: OrderRepo,
        users: UserRepo,
        catalog: CatalogRepo,
        addresses: AddressRepo,
        points: PointsService,
        payments: PaymentClient,
        notifier: Arc<dyn OrderNotifier>,
    ) -> Self {
        Self {
            pool,
            orders,
            users,
            catalog,
            addresses,
            points,
            payments,
            notifier,
        }
    }

    /// Places a cash-on-delivery order.
    pub async fn place_order_cod(
        &self,
        customer_id: Uuid,
        req: &PlaceOrderRequest,
    ) -> Result<Order, ApiError> {
        let order = self
            .create_order(customer_id, req, PaymentMethod::Cod)
            .await?;
        self.notify_status(&order, OrderStatus::OrderPlaced).await;
        Ok(order)
    }

    /// Places an online order and creates a checkout session with the
    /// payment provider, returning the redirect URL. If session creation
    /// fails the just-created order is removed again; nothing is left
    /// awaiting a webhook that will never come.
    pub async fn place_order_online(
        &self,
        customer_id: Uuid,
        req: &PlaceOrderRequest,
        origin: &str,
    ) -> Result<String, ApiError> {
        let order = self
            .create_order(customer_id, req, PaymentMethod::Online)
            .await?;

        let subtotal: Decimal = order
            .items
            .iter()
            .map(|item| item.unit_price * Decimal::from(item.quantity))
            .sum();

        let mut line_items: Vec<CheckoutLineItem> = order
            .items
            .iter()
            .map(|item| CheckoutLineItem {
                name: item.name.clone(),
                unit_amount_minor: to_minor_units(item.unit_price),
                quantity: item.quantity,
            })
            .collect();

        // One tax line instead of a per-item surcharge, so the session total
        // equals the stored order amount.
        let tax = order.amount - subtotal;
        if tax > Decimal::ZERO {
            line_items.push(CheckoutLineItem {
                name: "Tax (2%)".into(),
                unit_amount_minor: to_minor_units(tax),
                quantity: 1,
            });
        }

        let metadata = SessionMetadata {
            order_id: order.id,
            user_id: customer_id,
        };
        let session = self
            .payments
            .create_checkout_session(
                &line_items,
                &format!("{origin}/loader?next=my-orders"),
                &format!("{origin}/cart"),
                &metadata,
            )
            .await;

        match session {
            Ok(url) => Ok(url),
            Err(err) => {
                if let Err(cleanup) = self.orders.delete(order.id).await {
                    tracing::error!(order_id = %order.id, "failed to remove order after session failure: {cleanup:?}");
                }
                Err(err)
            }
        }
    }

    async fn create_order(
        &self,
        customer_id: Uuid,
        req: &PlaceOrderRequest,
        payment_method: PaymentMethod,
    ) -> Result<Order, ApiError> {
        if req.items.is_empty() {
            return Err(ApiError::Validation(
                "order must contain at least one item".into(),
            ));
        }

        let address = self
            .addresses
            .find_owned(req.address, customer_id)
            .await
            .map_err(|e| ApiError::not_found_as(e, "Address"))?;

        let mut items = Vec::with_capacity(req.items.len());
        let mut subtotal = Decimal::ZERO;
        for item in &req.items {
            if item.quantity <= 0 {
                return Err(ApiError::Validation(
                    "item quantity must be positive".into(),
                ));
            }
            let product = self
                .catalog
                .find_by_id(item.product)
                .await
                .map_err(|e| ApiError::not_found_as(e, "Product"))?;
            subtotal += product.offer_price * Decimal::from(item.quantity);
            items.push(OrderItem {
                product_id: product.id,
                name: product.name,
                unit_price: product.offer_price,
                quantity: item.quantity,
            });
        }

        let amount = order_total_with_tax(subtotal);
        let timeline = vec![TimelineEntry {
            status: OrderStatus::OrderPlaced.as_str().to_string(),
            description: PLACED_DESCRIPTION.to_string(),
            timestamp: Utc::now(),
            location: Some(PLACED_LOCATION.to_string()),
        }];

        let order = self
            .orders
            .insert(NewOrder {
                customer_id,
                items,
                amount,
                address,
                payment_method,
                timeline,
            })
            .await?;
        tracing::info!(order_id = %order.id, %customer_id, "order placed");
        Ok(order)
    }

    /// Validates and applies a status transition, persists it together with
    /// any points award, then notifies the customer best-effort.
    pub async fn advance_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        meta: StatusMeta,
    ) -> Result<Order, ApiError> {
        let mut tx = self.pool.begin().await?;

        let mut order = self
            .orders
            .find_for_update(&mut tx, order_id)
            .await
            .map_err(|e| ApiError::not_found_as(e, "Order"))?;

        let effects = apply_transition(&mut order, new_status, &meta, Utc::now())?;

        let updated = self
            .orders
            .apply_transition(
                &mut tx,
                order_id,
                order.status,
                &order.timeline,
                meta.tracking_number.as_deref(),
                meta.delivery_partner.as_deref(),
                meta.estimated_delivery,
                order.actual_delivery,
            )
            .await?;

        if effects.award_points {
            // Savepoint: an award failure must never revert or fail the
            // status update it was triggered by.
            let mut savepoint = tx.begin().await?;
            match self
                .points
                .award_points_for_order(&mut savepoint, order.customer_id, order.id, order.amount)
                .await
            {
                Ok(_) => savepoint.commit().await?,
                Err(err) => {
                    savepoint.rollback().await?;
                    tracing::error!(%order_id, "points award failed: {err}");
                }
            }
        }

        tx.commit().await?;

        self.notify_status(&updated, new_status).await;
        Ok(updated)
    }

    /// Payment-provider callback: marks the order paid, appends the payment
    /// entry to the timeline and clears the customer's cart.
    pub async fn handle_payment_confirmed(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;

        let mut order = self
            .orders
            .find_for_update(&mut tx, order_id)
            .await
            .map_err(|e| ApiError::not_found_as(e, "Order"))?;

        order.timeline.push(TimelineEntry {
            status: "Payment Confirmed".to_string(),
            description: "Payment has been successfully processed".to_string(),
            timestamp: Utc::now(),
            location: None,
        });
        self.orders
            .mark_paid(&mut tx, order_id, &order.timeline)
            .await?;
        self.users.clear_cart(&mut tx, user_id).await?;

        tx.commit().await?;
        tracing::info!(%order_id, %user_id, "payment confirmed");
        Ok(())
    }

    /// Payment-provider callback for a failed payment: the order record is
    /// removed entirely, compensating the failed reservation.
    pub async fn handle_payment_failed(&self, order_id: Uuid) -> Result<(), ApiError> {
        let removed = self.orders.delete(order_id).await?;
        if removed == 0 {
            tracing::warn!(%order_id, "payment failed for unknown order");
        } else {
            tracing::info!(%order_id, "order removed after failed payment");
        }
        Ok(())
    }

    /// Customer-initiated return request; only delivered orders qualify.
    pub async fn request_return(
        &self,
        order_id: Uuid,
        caller: AuthUser,
        reason: &str,
    ) -> Result<(), ApiError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await
            .map_err(|e| ApiError::not_found_as(e, "Order"))?;

        if order.customer_id != caller.id {
            return Err(ApiError::Forbidden);
        }
        if order.status != OrderStatus::Delivered {
            return Err(ApiError::Validation(
                "Order must be delivered to request return".into(),
            ));
        }

        let mut timeline = order.timeline.0;
        timeline.push(TimelineEntry {
            status: "Return Requested".to_string(),
            description: format!("Return requested: {reason}"),
            timestamp: Utc::now(),
            location: None,
        });
        self.orders
            .set_return_requested(order_id, reason, RefundStatus::Requested, &timeline)
            .await?;
        Ok(())
    }

    /// Customer-initiated cancellation, routed through the same transition
    /// table as seller updates.
    pub async fn cancel_order(&self, order_id: Uuid, caller: AuthUser) -> Result<Order, ApiError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await
            .map_err(|e| ApiError::not_found_as(e, "Order"))?;
        if order.customer_id != caller.id {
            return Err(ApiError::Forbidden);
        }
        self.advance_status(order_id, OrderStatus::Cancelled, StatusMeta::default())
            .await
    }

    /// Tracking view: the full order including its timeline, owner-only.
    pub async fn get_tracking(&self, order_id: Uuid, caller: AuthUser) -> Result<Order, ApiError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await
            .map_err(|e| ApiError::not_found_as(e, "Order"))?;
        if order.customer_id != caller.id {
            return Err(ApiError::Forbidden);
        }
        Ok(order)
    }

    pub async fn list_for_user(&self, customer_id: Uuid) -> Result<Vec<Order>, ApiError> {
        Ok(self.orders.list_for_user(customer_id).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<Order>, ApiError> {
        Ok(self.orders.list_all().await?)
    }

    /// Fire-and-forget customer notification, gated on the order's email
    /// preference. Failures are logged and swallowed.
    async fn notify_status(&self, order: &Order, status: OrderStatus) {
        if !order.notify_email {
            return;
        }
        let user = match self.users.find_by_id(order.customer_id).await {
            Ok(user) => user,
            Err(err) => {
                tracing::warn!(order_id = %order.id, "skipping notification, user lookup failed: {err:?}");
                return;
            }
        };
        if let Err(err) = self
            .notifier
            .notify_order_status(
                &user.email,
                &user.name,
                order.id,
                status,
                order.tracking_number.as_deref(),
            )
            .await
        {
            tracing::warn!(order_id = %order.id, "status notification failed: {err}");
        }
    }
}

fn to_minor_units(amount: Decimal) -> i64 {
    (amount * Decimal::from(100)).round().to_i64().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;
    use rust_decimal_macros::dec;
    use sqlx::types::Json;

    fn test_address(user_id: Uuid) -> Address {
        Address {
            id: Uuid::new_v4(),
            user_id,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            street: "1 Analytical Way".into(),
            city: "London".into(),
            state: "LDN".into(),
            zip_code: "E1".into(),
            country: "UK".into(),
            phone: "".into(),
        }
    }

    fn test_order(status: OrderStatus) -> Order {
        let customer_id = Uuid::new_v4();
        Order {
            id: Uuid::new_v4(),
            customer_id,
            items: Json(vec![OrderItem {
                product_id: Uuid::new_v4(),
                name: "Apples".into(),
                unit_price: dec!(48.50),
                quantity: 2,
            }]),
            amount: dec!(98),
            address: Json(test_address(customer_id)),
            status,
            payment_method: PaymentMethod::Cod,
            is_paid: false,
            tracking_number: None,
            delivery_partner: None,
            estimated_delivery: None,
            actual_delivery: None,
            timeline: Json(vec![TimelineEntry {
                status: "Order Placed".into(),
                description: PLACED_DESCRIPTION.into(),
                timestamp: Utc::now(),
                location: Some(PLACED_LOCATION.into()),
            }]),
            notify_email: true,
            return_requested: false,
            return_reason: None,
            refund_status: RefundStatus::None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn transition_table_matches_the_state_machine() {
        use OrderStatus::*;
        let forward = [
            (OrderPlaced, Confirmed),
            (Confirmed, Processing),
            (Processing, Shipped),
            (Shipped, OutForDelivery),
            (OutForDelivery, Delivered),
        ];
        for (from, to) in forward {
            assert!(transition_allowed(from, to), "{from} -> {to} should pass");
        }

        // Cancellation branches from every pre-delivery state except
        // out-for-delivery.
        for from in [OrderPlaced, Confirmed, Processing, Shipped] {
            assert!(transition_allowed(from, Cancelled));
        }
        assert!(!transition_allowed(OutForDelivery, Cancelled));

        // Terminal states and skips are rejected.
        assert!(!transition_allowed(Delivered, Delivered));
        assert!(!transition_allowed(Delivered, Returned));
        assert!(!transition_allowed(Cancelled, Confirmed));
        assert!(!transition_allowed(OrderPlaced, Shipped));
        assert!(!transition_allowed(Confirmed, Delivered));
        assert!(!transition_allowed(Delivered, OrderPlaced));
    }

    #[test]
    fn transition_appends_timeline_and_keeps_old_entries() {
        let mut order = test_order(OrderStatus::Processing);
        let effects = apply_transition(
            &mut order,
            OrderStatus::Shipped,
            &StatusMeta::default(),
            Utc::now(),
        )
        .unwrap();

        assert!(!effects.award_points);
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.timeline.len(), 2);
        assert_eq!(order.timeline[0].status, "Order Placed");
        let entry = order.timeline.last().unwrap();
        assert_eq!(entry.status, "Shipped");
        assert_eq!(
            entry.description,
            "Your order has been shipped and is on its way"
        );
    }

    #[test]
    fn meta_merges_and_omission_never_clears() {
        let mut order = test_order(OrderStatus::Processing);
        let meta = StatusMeta {
            tracking_number: Some("TRK-7".into()),
            delivery_partner: Some("FastShip".into()),
            estimated_delivery: Some(Utc::now()),
            location: Some("Depot 4".into()),
        };
        apply_transition(&mut order, OrderStatus::Shipped, &meta, Utc::now()).unwrap();
        assert_eq!(order.tracking_number.as_deref(), Some("TRK-7"));
        assert_eq!(order.delivery_partner.as_deref(), Some("FastShip"));
        assert_eq!(
            order.timeline.last().unwrap().location.as_deref(),
            Some("Depot 4")
        );

        // Next transition omits everything; the stored values survive.
        apply_transition(
            &mut order,
            OrderStatus::OutForDelivery,
            &StatusMeta::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(order.tracking_number.as_deref(), Some("TRK-7"));
        assert_eq!(order.delivery_partner.as_deref(), Some("FastShip"));
        assert!(order.estimated_delivery.is_some());
    }

    #[test]
    fn first_delivery_sets_actual_delivery_and_awards_once() {
        let mut order = test_order(OrderStatus::OutForDelivery);
        let now = Utc::now();
        let effects =
            apply_transition(&mut order, OrderStatus::Delivered, &StatusMeta::default(), now)
                .unwrap();

        assert!(effects.award_points);
        assert_eq!(order.actual_delivery, Some(now));

        // A duplicate delivery call is an invalid transition and must not
        // re-trigger an award or touch the timestamp.
        let again = apply_transition(
            &mut order,
            OrderStatus::Delivered,
            &StatusMeta::default(),
            Utc::now(),
        );
        assert!(again.is_err());
        assert_eq!(order.actual_delivery, Some(now));
        assert_eq!(order.timeline.len(), 2);
    }

    #[test]
    fn invalid_transition_leaves_order_untouched() {
        let mut order = test_order(OrderStatus::OrderPlaced);
        let before_len = order.timeline.len();
        let err = apply_transition(
            &mut order,
            OrderStatus::Delivered,
            &StatusMeta::default(),
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(order.status, OrderStatus::OrderPlaced);
        assert_eq!(order.timeline.len(), before_len);
        assert!(order.actual_delivery.is_none());
    }

    #[test]
    fn descriptions_are_fixed_per_status() {
        assert_eq!(
            status_description(OrderStatus::Confirmed),
            "Your order has been confirmed and is being prepared"
        );
        assert_eq!(
            status_description(OrderStatus::Delivered),
            "Your order has been delivered successfully"
        );
        assert_eq!(
            status_description(OrderStatus::Returned),
            "Order status updated to Returned"
        );
    }

    #[test]
    fn minor_unit_conversion() {
        assert_eq!(to_minor_units(dec!(48.50)), 4850);
        assert_eq!(to_minor_units(dec!(1)), 100);
        assert_eq!(to_minor_units(dec!(0.99)), 99);
    }
}

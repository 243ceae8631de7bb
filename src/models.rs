use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// Order status as stored in Postgres and sent over the wire. The string
/// values are case-sensitive and shared with the storefront UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status")]
pub enum OrderStatus {
    #[sqlx(rename = "Order Placed")]
    #[serde(rename = "Order Placed")]
    OrderPlaced,
    Confirmed,
    Processing,
    Shipped,
    #[sqlx(rename = "Out for Delivery")]
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderPlaced => "Order Placed",
            Self::Confirmed => "Confirmed",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::OutForDelivery => "Out for Delivery",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Returned => "Returned",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method")]
pub enum PaymentMethod {
    #[sqlx(rename = "COD")]
    #[serde(rename = "COD")]
    Cod,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "refund_status")]
pub enum RefundStatus {
    None,
    Requested,
    Approved,
    Processed,
    Completed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "membership_tier")]
pub enum MembershipTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bronze => "Bronze",
            Self::Silver => "Silver",
            Self::Gold => "Gold",
            Self::Platinum => "Platinum",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Seller,
}

/// Ledger entry kind inside a user's points history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Earned,
    Redeemed,
    Expired,
}

/// One line of an order, snapshotted from the catalog at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i64,
}

/// One append-only entry in an order's timeline. `status` is a display
/// label: usually an [`OrderStatus`] wire string, but payment confirmations
/// and return requests append their own labels without being order statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub status: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub location: Option<String>,
}

/// Shipping address snapshot embedded in the order document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub items: Json<Vec<OrderItem>>,
    pub amount: Decimal,
    pub address: Json<Address>,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub is_paid: bool,
    pub tracking_number: Option<String>,
    pub delivery_partner: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub timeline: Json<Vec<TimelineEntry>>,
    pub notify_email: bool,
    pub return_requested: bool,
    pub return_reason: Option<String>,
    pub refund_status: RefundStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of a user's points ledger. `amount` is signed: positive for
/// earned entries, negative for redeemed ones, zero for tier notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsEntry {
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub cart_items: Json<HashMap<Uuid, i64>>,
    pub points: i64,
    pub total_points_earned: i64,
    pub total_points_redeemed: i64,
    pub points_history: Json<Vec<PointsEntry>>,
    pub membership_tier: MembershipTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub offer_price: Decimal,
    pub in_stock: bool,
}

/// Authenticated caller attached to the request by the JWT middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

// ---- request bodies ----

#[derive(Debug, Deserialize)]
pub struct ItemRef {
    pub product: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub items: Vec<ItemRef>,
    pub address: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub delivery_partner: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    pub order_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemPointsRequest {
    pub points_to_redeem: i64,
}

/// Optional annotations merged into an order on a status transition.
/// Absent fields never clear previously stored values.
#[derive(Debug, Clone, Default)]
pub struct StatusMeta {
    pub tracking_number: Option<String>,
    pub delivery_partner: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_strings_are_exact() {
        for (status, wire) in [
            (OrderStatus::OrderPlaced, "\"Order Placed\""),
            (OrderStatus::Confirmed, "\"Confirmed\""),
            (OrderStatus::Processing, "\"Processing\""),
            (OrderStatus::Shipped, "\"Shipped\""),
            (OrderStatus::OutForDelivery, "\"Out for Delivery\""),
            (OrderStatus::Delivered, "\"Delivered\""),
            (OrderStatus::Cancelled, "\"Cancelled\""),
            (OrderStatus::Returned, "\"Returned\""),
        ] {
            assert_eq!(serde_json::to_string(&status).unwrap(), wire);
            let parsed: OrderStatus = serde_json::from_str(wire).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn transaction_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TransactionType::Earned).unwrap(),
            "\"earned\""
        );
        assert_eq!(
            serde_json::to_string(&TransactionType::Redeemed).unwrap(),
            "\"redeemed\""
        );
    }

    #[test]
    fn points_entry_omits_missing_order_id() {
        let entry = PointsEntry {
            transaction_type: TransactionType::Redeemed,
            amount: -100,
            description: "Redeemed 100 points".into(),
            order_id: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("orderId").is_none());
        assert_eq!(json["transactionType"], "redeemed");
    }
}

//! Customer notifications for order status changes. Delivery is best-effort:
//! callers log failures and never let them fail the triggering operation.

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::models::OrderStatus;

#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn notify_order_status(
        &self,
        email: &str,
        name: &str,
        order_id: Uuid,
        status: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(String);

fn subject_for(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::OrderPlaced => "Order Confirmed - GreenCart",
        OrderStatus::Confirmed | OrderStatus::Processing => {
            "Order Processing Started - GreenCart"
        }
        OrderStatus::Shipped => "Order Shipped - GreenCart",
        OrderStatus::OutForDelivery => "Order Out for Delivery - GreenCart",
        OrderStatus::Delivered => "Order Delivered - GreenCart",
        OrderStatus::Cancelled => "Order Cancelled - GreenCart",
        OrderStatus::Returned => "Order Return Update - GreenCart",
    }
}

fn body_for(
    status: OrderStatus,
    name: &str,
    order_id: Uuid,
    tracking_number: Option<&str>,
) -> String {
    let mut body = match status {
        OrderStatus::OrderPlaced => format!(
            "Dear {name},\n\nYour order #{order_id} has been successfully placed and confirmed.\n\
             We'll keep you updated on your order status."
        ),
        OrderStatus::Confirmed | OrderStatus::Processing => format!(
            "Dear {name},\n\nYour order #{order_id} is being processed and prepared for shipping."
        ),
        OrderStatus::Shipped => {
            format!("Dear {name},\n\nYour order #{order_id} has been shipped!")
        }
        OrderStatus::OutForDelivery => format!(
            "Dear {name},\n\nYour order #{order_id} is out for delivery and will arrive soon."
        ),
        OrderStatus::Delivered => format!(
            "Dear {name},\n\nYour order #{order_id} has been delivered. Thank you for shopping \
             with GreenCart!"
        ),
        OrderStatus::Cancelled => {
            format!("Dear {name},\n\nYour order #{order_id} has been cancelled.")
        }
        OrderStatus::Returned => {
            format!("Dear {name},\n\nYour return for order #{order_id} has been processed.")
        }
    };
    if let Some(tracking) = tracking_number {
        body.push_str(&format!("\n\nTracking Number: {tracking}"));
    }
    body
}

/// Sends mail through an HTTP relay endpoint.
pub struct MailRelayNotifier {
    http: reqwest::Client,
    relay_url: String,
    from: String,
}

impl MailRelayNotifier {
    pub fn new(relay_url: String, from: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            relay_url,
            from,
        }
    }
}

#[async_trait]
impl OrderNotifier for MailRelayNotifier {
    async fn notify_order_status(
        &self,
        email: &str,
        name: &str,
        order_id: Uuid,
        status: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<(), NotifyError> {
        let payload = json!({
            "from": self.from,
            "to": email,
            "subject": subject_for(status),
            "text": body_for(status, name, order_id, tracking_number),
        });

        let response = self
            .http
            .post(&self.relay_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError(format!(
                "mail relay returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Fallback when no mail relay is configured: notifications are logged only,
/// matching the unconfigured behavior of the storefront's mail setup.
pub struct LogOnlyNotifier;

#[async_trait]
impl OrderNotifier for LogOnlyNotifier {
    async fn notify_order_status(
        &self,
        email: &str,
        _name: &str,
        order_id: Uuid,
        status: OrderStatus,
        _tracking_number: Option<&str>,
    ) -> Result<(), NotifyError> {
        tracing::info!(%order_id, %status, email, "order status notification (mail relay not configured)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_body_includes_tracking_when_present() {
        let order_id = Uuid::new_v4();
        let body = body_for(OrderStatus::Shipped, "Ada", order_id, Some("TRK-42"));
        assert!(body.contains("Tracking Number: TRK-42"));

        let without = body_for(OrderStatus::Shipped, "Ada", order_id, None);
        assert!(!without.contains("Tracking Number"));
    }

    #[test]
    fn every_status_has_a_subject() {
        for status in [
            OrderStatus::OrderPlaced,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Returned,
        ] {
            assert!(subject_for(status).contains("GreenCart"));
        }
    }
}

//! Thin client for the external payment provider. The provider is an opaque
//! collaborator: we create a hosted checkout session carrying our order and
//! user ids as metadata, and later receive a webhook keyed by the same ids.

use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

/// One checkout line as the provider expects it: minor currency units.
#[derive(Debug, Clone)]
pub struct CheckoutLineItem {
    pub name: String,
    pub unit_amount_minor: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct SessionMetadata {
    pub order_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionResponse {
    url: String,
}

/// Inbound webhook event, reduced to the fields this service consumes.
/// Metadata values arrive as strings and are parsed at the boundary.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: WebhookObject,
}

#[derive(Debug, Deserialize)]
pub struct WebhookObject {
    #[serde(default)]
    pub metadata: WebhookMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl WebhookMetadata {
    pub fn order_id(&self) -> Option<Uuid> {
        self.order_id.as_deref().and_then(|s| Uuid::parse_str(s).ok())
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id.as_deref().and_then(|s| Uuid::parse_str(s).ok())
    }
}

#[derive(Clone)]
pub struct PaymentClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl PaymentClient {
    pub fn new(api_base: String, secret_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            secret_key,
        }
    }

    /// Creates a hosted checkout session and returns the redirect URL.
    /// Metadata is attached to the payment intent so the webhook can resolve
    /// the order without a second lookup.
    pub async fn create_checkout_session(
        &self,
        line_items: &[CheckoutLineItem],
        success_url: &str,
        cancel_url: &str,
        metadata: &SessionMetadata,
    ) -> Result<String, ApiError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), success_url.into()),
            ("cancel_url".into(), cancel_url.into()),
            (
                "payment_intent_data[metadata][order_id]".into(),
                metadata.order_id.to_string(),
            ),
            (
                "payment_intent_data[metadata][user_id]".into(),
                metadata.user_id.to_string(),
            ),
        ];

        for (i, item) in line_items.iter().enumerate() {
            form.push((
                format!("line_items[{i}][price_data][currency]"),
                "usd".into(),
            ));
            form.push((
                format!("line_items[{i}][price_data][product_data][name]"),
                item.name.clone(),
            ));
            form.push((
                format!("line_items[{i}][price_data][unit_amount]"),
                item.unit_amount_minor.to_string(),
            ));
            form.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
        }

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::ExternalService(format!("checkout session request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body, "payment provider rejected checkout session");
            return Err(ApiError::ExternalService(format!(
                "payment provider returned {status}"
            )));
        }

        let session: CheckoutSessionResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ExternalService(format!("checkout session response: {e}")))?;
        Ok(session.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_event_parses_metadata() {
        let order_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let payload = format!(
            r#"{{
                "type": "payment_intent.succeeded",
                "data": {{ "object": {{ "metadata": {{
                    "order_id": "{order_id}",
                    "user_id": "{user_id}"
                }} }} }}
            }}"#
        );

        let event: WebhookEvent = serde_json::from_str(&payload).unwrap();
        assert_eq!(event.event_type, EVENT_PAYMENT_SUCCEEDED);
        assert_eq!(event.data.object.metadata.order_id(), Some(order_id));
        assert_eq!(event.data.object.metadata.user_id(), Some(user_id));
    }

    #[test]
    fn webhook_event_tolerates_missing_metadata() {
        let payload = r#"{"type": "payment_intent.payment_failed", "data": {"object": {}}}"#;
        let event: WebhookEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(event.event_type, EVENT_PAYMENT_FAILED);
        assert_eq!(event.data.object.metadata.order_id(), None);
    }

    #[test]
    fn malformed_metadata_does_not_parse_as_ids() {
        let meta = WebhookMetadata {
            order_id: Some("not-a-uuid".into()),
            user_id: None,
        };
        assert_eq!(meta.order_id(), None);
        assert_eq!(meta.user_id(), None);
    }
}

//! Inbound payment-provider webhook. Non-retriable problems (bad event
//! shape, unknown order, missing metadata) are logged and acknowledged so
//! the provider does not retry forever; database errors surface as 500s and
//! may be retried.

use actix_web::{post, web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::error::ApiError;
use crate::lifecycle::OrderLifecycle;
use crate::payments::{WebhookEvent, EVENT_PAYMENT_FAILED, EVENT_PAYMENT_SUCCEEDED};

/// Shared secret the provider is configured to send with each delivery.
#[derive(Clone)]
pub struct WebhookSecret(pub String);

#[post("/stripe")]
pub async fn payment_webhook(
    lifecycle: web::Data<OrderLifecycle>,
    secret: web::Data<WebhookSecret>,
    req: HttpRequest,
    event: web::Json<WebhookEvent>,
) -> Result<HttpResponse, ApiError> {
    let provided = req
        .headers()
        .get("Webhook-Secret")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    if provided != secret.0 {
        return Err(ApiError::Unauthorized);
    }

    let event = event.into_inner();
    let metadata = &event.data.object.metadata;

    match event.event_type.as_str() {
        EVENT_PAYMENT_SUCCEEDED => {
            let (Some(order_id), Some(user_id)) = (metadata.order_id(), metadata.user_id()) else {
                tracing::error!("payment succeeded event with missing or malformed metadata");
                return Ok(acknowledge());
            };
            match lifecycle.handle_payment_confirmed(order_id, user_id).await {
                Ok(()) => {}
                Err(ApiError::NotFound(_)) => {
                    tracing::warn!(%order_id, "payment confirmed for unknown order");
                }
                Err(err) => return Err(err),
            }
        }
        EVENT_PAYMENT_FAILED => {
            let Some(order_id) = metadata.order_id() else {
                tracing::error!("payment failed event with missing or malformed metadata");
                return Ok(acknowledge());
            };
            lifecycle.handle_payment_failed(order_id).await?;
        }
        other => {
            tracing::warn!(event_type = other, "unhandled payment event type");
        }
    }

    Ok(acknowledge())
}

fn acknowledge() -> HttpResponse {
    HttpResponse::Ok().json(json!({"received": true}))
}

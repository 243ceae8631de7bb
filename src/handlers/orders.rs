use actix_web::http::header;
use actix_web::{get, post, put, web, HttpRequest, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::lifecycle::OrderLifecycle;
use crate::middleware::auth::require_seller;
use crate::models::{
    AuthUser, CancelOrderRequest, PlaceOrderRequest, ReturnRequest, StatusMeta,
    UpdateStatusRequest,
};

#[post("/cod")]
pub async fn place_order_cod(
    lifecycle: web::Data<OrderLifecycle>,
    user: AuthUser,
    req: web::Json<PlaceOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    lifecycle.place_order_cod(user.id, &req).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Order Placed Successfully"
    })))
}

#[post("/stripe")]
pub async fn place_order_stripe(
    lifecycle: web::Data<OrderLifecycle>,
    user: AuthUser,
    http_req: HttpRequest,
    req: web::Json<PlaceOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    let origin = http_req
        .headers()
        .get(header::ORIGIN)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Validation("missing Origin header".into()))?
        .to_owned();

    let url = lifecycle.place_order_online(user.id, &req, &origin).await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "url": url})))
}

#[put("/update-status")]
pub async fn update_status(
    lifecycle: web::Data<OrderLifecycle>,
    user: AuthUser,
    req: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    require_seller(user)?;
    let req = req.into_inner();
    let meta = StatusMeta {
        tracking_number: req.tracking_number,
        delivery_partner: req.delivery_partner,
        estimated_delivery: req.estimated_delivery,
        location: req.location,
    };
    let order = lifecycle
        .advance_status(req.order_id, req.status, meta)
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Order status updated successfully",
        "order": order
    })))
}

#[get("/tracking/{order_id}")]
pub async fn get_tracking(
    lifecycle: web::Data<OrderLifecycle>,
    user: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let order = lifecycle.get_tracking(path.into_inner(), user).await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "order": order})))
}

#[post("/return-request")]
pub async fn request_return(
    lifecycle: web::Data<OrderLifecycle>,
    user: AuthUser,
    req: web::Json<ReturnRequest>,
) -> Result<HttpResponse, ApiError> {
    lifecycle
        .request_return(req.order_id, user, &req.reason)
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Return request submitted successfully"
    })))
}

#[post("/cancel")]
pub async fn cancel_order(
    lifecycle: web::Data<OrderLifecycle>,
    user: AuthUser,
    req: web::Json<CancelOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    lifecycle.cancel_order(req.order_id, user).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Order cancelled successfully"
    })))
}

#[get("/user")]
pub async fn get_user_orders(
    lifecycle: web::Data<OrderLifecycle>,
    user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let orders = lifecycle.list_for_user(user.id).await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "orders": orders})))
}

#[get("/seller")]
pub async fn get_all_orders(
    lifecycle: web::Data<OrderLifecycle>,
    user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    require_seller(user)?;
    let orders = lifecycle.list_all().await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "orders": orders})))
}

use actix_web::{get, post, web, HttpResponse};
use serde_json::json;

use crate::awards::PointsService;
use crate::error::ApiError;
use crate::models::{AuthUser, RedeemPointsRequest};
use crate::points::{format_currency, format_points};

#[get("/user")]
pub async fn get_user_points(
    points: web::Data<PointsService>,
    user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let snapshot = points.snapshot(user.id).await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "data": snapshot})))
}

#[get("/history")]
pub async fn get_points_history(
    points: web::Data<PointsService>,
    user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let history = points.history(user.id).await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "data": history})))
}

#[get("/redemption-options")]
pub async fn get_redemption_options(
    points: web::Data<PointsService>,
    user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let options = points.redemption_options(user.id).await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "data": options})))
}

#[post("/redeem")]
pub async fn redeem_points(
    points: web::Data<PointsService>,
    user: AuthUser,
    req: web::Json<RedeemPointsRequest>,
) -> Result<HttpResponse, ApiError> {
    let outcome = points.redeem_points(user.id, req.points_to_redeem).await?;
    let message = format!(
        "Successfully redeemed {} points for {} discount",
        format_points(outcome.points_redeemed),
        format_currency(outcome.discount_amount)
    );
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": message,
        "data": outcome
    })))
}

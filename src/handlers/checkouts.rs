use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::common::{created_response, success_response};
use crate::handlers::AppState;
use crate::models::{LineItem, ShippingSelection};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCheckoutRequest {
    pub channel_id: Uuid,
    pub items: Vec<LineItem>,
    pub shipping: ShippingSelection,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PromoCodeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddGiftCardRequest {
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompleteRequest {
    /// Token from a prior pricing call.
    pub token: Uuid,
}

pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CreateCheckoutRequest>,
) -> Result<Response, ServiceError> {
    let checkout = state
        .services
        .checkouts
        .create(payload.channel_id, payload.items, payload.shipping)
        .await?;
    Ok(created_response(checkout))
}

pub async fn get_checkout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.checkouts.get(id)?))
}

/// Applies a voucher code. Failures surface as 422 with a structured
/// `{field, reason}` body attached to `promoCode`.
pub async fn apply_promo_code(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PromoCodeRequest>,
) -> Result<Response, ServiceError> {
    let pricing = state
        .services
        .checkouts
        .apply_promo_code(id, &payload.code, Utc::now())
        .await?;
    Ok(success_response(pricing))
}

pub async fn remove_promo_code(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let checkout = state.services.checkouts.remove_promo_code(id).await?;
    Ok(success_response(checkout))
}

pub async fn add_gift_card(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddGiftCardRequest>,
) -> Result<Response, ServiceError> {
    let checkout = state
        .services
        .checkouts
        .add_gift_card(id, &payload.code, Utc::now())
        .await?;
    Ok(success_response(checkout))
}

/// Phase one of completion: validates every attached instrument and
/// returns the authoritative breakdown plus a short-lived token.
pub async fn price_checkout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let reservation = state.services.checkouts.price(id, Utc::now()).await?;
    Ok(success_response(reservation))
}

/// Phase two: consumes the token, debits gift cards, commits voucher
/// usage, and creates the order.
pub async fn complete_checkout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteRequest>,
) -> Result<Response, ServiceError> {
    let order = state
        .services
        .checkouts
        .complete(id, payload.token, Utc::now())
        .await?;
    Ok(success_response(order))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_checkout))
        .route("/:id", get(get_checkout))
        .route(
            "/:id/promo-code",
            post(apply_promo_code).delete(remove_promo_code),
        )
        .route("/:id/gift-cards", post(add_gift_card))
        .route("/:id/price", post(price_checkout))
        .route("/:id/complete", post(complete_checkout))
}

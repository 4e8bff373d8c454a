use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::common::{created_response, no_content_response, success_response};
use crate::handlers::AppState;
use crate::services::gift_cards::{NewGiftCard, UpdateGiftCard};

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct GiftCardQuery {
    /// Exact code lookup; takes precedence over `tag`.
    pub code: Option<String>,
    /// Case-insensitive tag filter.
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct ReverseRequest {
    pub amount: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteGiftCardRequest {
    #[serde(default)]
    pub consent_confirmed: bool,
}

pub async fn create_gift_card(
    State(state): State<AppState>,
    Json(payload): Json<NewGiftCard>,
) -> Result<Response, ServiceError> {
    let card = state.services.gift_cards.create(payload).await?;
    Ok(created_response(card))
}

/// Lookup never errors on a missing card: deleted or never-issued cards
/// come back as a JSON `null` body.
pub async fn get_gift_card(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.gift_cards.find_by_id(id)))
}

pub async fn list_gift_cards(
    State(state): State<AppState>,
    Query(query): Query<GiftCardQuery>,
) -> Result<Response, ServiceError> {
    if let Some(code) = query.code {
        return Ok(success_response(
            state.services.gift_cards.find_by_code(&code),
        ));
    }
    let cards = match query.tag {
        Some(tag) => state.services.gift_cards.list_by_tag(&tag),
        None => state.services.gift_cards.list(),
    };
    Ok(success_response(cards))
}

pub async fn update_gift_card(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateGiftCard>,
) -> Result<Response, ServiceError> {
    let card = state.services.gift_cards.update(id, payload).await?;
    Ok(success_response(card))
}

pub async fn redeem_gift_card(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RedeemRequest>,
) -> Result<Response, ServiceError> {
    let balance = state
        .services
        .gift_cards
        .redeem(id, payload.amount, &payload.currency, Utc::now())
        .await?;
    Ok(success_response(json!({ "balance": balance })))
}

pub async fn reverse_gift_card(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReverseRequest>,
) -> Result<Response, ServiceError> {
    let balance = state
        .services
        .gift_cards
        .reverse(id, payload.amount)
        .await?;
    Ok(success_response(json!({ "balance": balance })))
}

/// Deletion is destructive and requires explicit consent in the body.
pub async fn delete_gift_card(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<DeleteGiftCardRequest>>,
) -> Result<Response, ServiceError> {
    let consent = payload.map(|Json(p)| p.consent_confirmed).unwrap_or(false);
    state.services.gift_cards.delete(id, consent).await?;
    Ok(no_content_response())
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_gift_card).get(list_gift_cards))
        .route(
            "/:id",
            get(get_gift_card).put(update_gift_card).delete(delete_gift_card),
        )
        .route("/:id/redeem", post(redeem_gift_card))
        .route("/:id/reverse", post(reverse_gift_card))
}

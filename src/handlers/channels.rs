use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::common::{created_response, success_response, validate_input};
use crate::handlers::AppState;
use crate::models::InstrumentKind;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateChannelRequest {
    #[validate(length(min = 1, message = "Channel name cannot be empty"))]
    pub name: String,
    /// 3-letter ISO 4217 code, e.g. "USD"
    #[validate(length(min = 3, max = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetInstrumentRequest {
    pub kind: InstrumentKind,
    pub enabled: bool,
}

pub async fn create_channel(
    State(state): State<AppState>,
    Json(payload): Json<CreateChannelRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let channel = state
        .services
        .channels
        .create(&payload.name, &payload.currency)
        .await?;
    Ok(created_response(channel))
}

pub async fn list_channels(State(state): State<AppState>) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.channels.list()))
}

pub async fn get_channel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.channels.get(id)?))
}

pub async fn get_channel_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.channels.get_by_slug(&slug)?))
}

/// Toggles one promotional-instrument flag for the channel and returns
/// the updated channel.
pub async fn set_instrument(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetInstrumentRequest>,
) -> Result<Response, ServiceError> {
    let channel = state
        .services
        .channels
        .set_instrument_enabled(id, payload.kind, payload.enabled)
        .await?;
    Ok(success_response(channel))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_channel).get(list_channels))
        .route("/:id", get(get_channel))
        .route("/by-slug/:slug", get(get_channel_by_slug))
        .route("/:id/instruments", put(set_instrument))
}

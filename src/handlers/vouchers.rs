use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::common::{created_response, no_content_response, success_response};
use crate::handlers::AppState;
use crate::services::vouchers::NewVoucher;

#[derive(Debug, Deserialize)]
pub struct SetChannelsRequest {
    pub channel_ids: Vec<Uuid>,
}

pub async fn create_voucher(
    State(state): State<AppState>,
    Json(payload): Json<NewVoucher>,
) -> Result<Response, ServiceError> {
    let voucher = state.services.vouchers.create(payload).await?;
    Ok(created_response(voucher))
}

pub async fn get_voucher(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.vouchers.get(&code)?))
}

pub async fn delete_voucher(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, ServiceError> {
    state.services.vouchers.delete(&code).await?;
    Ok(no_content_response())
}

/// Replaces the set of channels the voucher is usable in.
pub async fn set_voucher_channels(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(payload): Json<SetChannelsRequest>,
) -> Result<Response, ServiceError> {
    let voucher = state
        .services
        .vouchers
        .set_channels(&code, payload.channel_ids)
        .await?;
    Ok(success_response(voucher))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_voucher))
        .route("/:code", get(get_voucher).delete(delete_voucher))
        .route("/:code/channels", put(set_voucher_channels))
}

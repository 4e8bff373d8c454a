//! Promotions API Library
//!
//! Promotion and store-credit engine: sales channels, voucher
//! validation and pricing, a gift-card balance ledger, and the
//! checkout pricing aggregator that composes them.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod openapi;
pub mod services;
pub mod store;

use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: services::AppServices,
    pub store: Arc<store::Store>,
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "channels": state.store.channels.len(),
        "vouchers": state.store.vouchers.len(),
        "gift_cards": state.store.gift_cards.len(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Full v1 API surface.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/channels", handlers::channels::routes())
        .nest("/vouchers", handlers::vouchers::routes())
        .nest("/gift-cards", handlers::gift_cards::routes())
        .nest("/checkouts", handlers::checkouts::routes())
}

/// Assembled application router, minus the transport-level layers the
/// binary adds (CORS, tracing).
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "promotions-api up" }))
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::routes())
        .with_state(state)
}

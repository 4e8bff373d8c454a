use axum::{response::Json, routing::get, Router};
use utoipa::OpenApi;

use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Promotions API",
        version = "1.0.0",
        description = "Promotion and store-credit engine: sales channels, \
            voucher validation and pricing, gift-card balances, and checkout \
            pricing. Instrument rejections return HTTP 422 with a \
            `{field, reason}` body."
    ),
    servers(
        (url = "http://localhost:8080/api/v1", description = "Local development")
    ),
    tags(
        (name = "Channels", description = "Sales channel registry"),
        (name = "Vouchers", description = "Voucher management and validation"),
        (name = "Gift Cards", description = "Gift-card ledger"),
        (name = "Checkouts", description = "Checkout pricing and completion")
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::errors::Rejection,
        crate::errors::RejectionReason,
        crate::models::Channel,
        crate::models::InstrumentFlags,
        crate::models::InstrumentKind,
        crate::models::LineItem,
        crate::models::ShippingSelection,
        crate::models::CheckoutStatus,
        crate::models::PeriodUnit,
        crate::models::ExpiryPeriod,
        crate::handlers::channels::CreateChannelRequest,
        crate::handlers::channels::SetInstrumentRequest,
        crate::handlers::checkouts::CreateCheckoutRequest,
        crate::handlers::checkouts::PromoCodeRequest,
        crate::handlers::checkouts::AddGiftCardRequest,
        crate::handlers::checkouts::CompleteRequest,
    ))
)]
pub struct ApiDoc;

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_builds_and_lists_schemas() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.schemas.contains_key("Rejection"));
        assert!(components.schemas.contains_key("Channel"));
    }
}

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Datelike, Months, Utc};
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn card_without_expiry_reports_null_expiry() {
    let app = TestApp::new();
    let card = app
        .request_json(
            Method::POST,
            "/api/v1/gift-cards",
            Some(json!({ "amount": 100, "currency": "USD", "expiry": { "type": "never" } })),
            StatusCode::CREATED,
        )
        .await;

    assert!(card["expires_on"].is_null());
    assert_eq!(card["current_balance"], card["initial_balance"]);
    let code = card["code"].as_str().unwrap();
    assert_eq!(code.len(), 19);
    assert_eq!(code.matches('-').count(), 3);
}

#[tokio::test]
async fn period_expiry_resolves_against_the_issue_date() {
    let app = TestApp::new();
    let card = app
        .request_json(
            Method::POST,
            "/api/v1/gift-cards",
            Some(json!({
                "amount": 100,
                "currency": "USD",
                "expiry": { "type": "period", "amount": 2, "unit": "month" }
            })),
            StatusCode::CREATED,
        )
        .await;

    let expected = Utc::now()
        .date_naive()
        .checked_add_months(Months::new(2))
        .unwrap();
    assert_eq!(card["expires_on"], expected.to_string());
    assert!(expected.month() != Utc::now().month() || expected.year() != Utc::now().year());
}

#[tokio::test]
async fn update_replaces_tags_and_clears_expiry() {
    let app = TestApp::new();
    let card = app
        .request_json(
            Method::POST,
            "/api/v1/gift-cards",
            Some(json!({
                "amount": 50,
                "currency": "USD",
                "tags": ["holiday"],
                "expiry": { "type": "period", "amount": 1, "unit": "year" }
            })),
            StatusCode::CREATED,
        )
        .await;
    let id = card["id"].as_str().unwrap();

    let updated = app
        .request_json(
            Method::PUT,
            &format!("/api/v1/gift-cards/{}", id),
            Some(json!({ "tags": ["vip", "loyalty"], "expiry": { "type": "never" } })),
            StatusCode::OK,
        )
        .await;

    assert_eq!(updated["tags"], json!(["vip", "loyalty"]));
    assert!(updated["expires_on"].is_null());

    // Tag filter sees the new tags, case-insensitively.
    let listed = app
        .request_json(Method::GET, "/api/v1/gift-cards?tag=VIP", None, StatusCode::OK)
        .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    let empty = app
        .request_json(
            Method::GET,
            "/api/v1/gift-cards?tag=holiday",
            None,
            StatusCode::OK,
        )
        .await;
    assert!(empty.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn redeem_and_reverse_move_the_balance() {
    let app = TestApp::new();
    let card = app
        .request_json(
            Method::POST,
            "/api/v1/gift-cards",
            Some(json!({ "amount": 100, "currency": "USD" })),
            StatusCode::CREATED,
        )
        .await;
    let id = card["id"].as_str().unwrap();

    let after_redeem = app
        .request_json(
            Method::POST,
            &format!("/api/v1/gift-cards/{}/redeem", id),
            Some(json!({ "amount": 30, "currency": "USD" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(after_redeem["balance"], "70");

    let after_reverse = app
        .request_json(
            Method::POST,
            &format!("/api/v1/gift-cards/{}/reverse", id),
            Some(json!({ "amount": 10 })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(after_reverse["balance"], "80");

    // Overdraw is refused with the shortfall spelled out.
    app.request_json(
        Method::POST,
        &format!("/api/v1/gift-cards/{}/redeem", id),
        Some(json!({ "amount": 500, "currency": "USD" })),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;

    // Wrong currency never debits.
    app.request_json(
        Method::POST,
        &format!("/api/v1/gift-cards/{}/redeem", id),
        Some(json!({ "amount": 10, "currency": "EUR" })),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;
}

#[tokio::test]
async fn delete_requires_consent_and_lookups_return_null_after() {
    let app = TestApp::new();
    let card = app
        .request_json(
            Method::POST,
            "/api/v1/gift-cards",
            Some(json!({ "amount": 100, "currency": "USD" })),
            StatusCode::CREATED,
        )
        .await;
    let id = card["id"].as_str().unwrap();
    let code = card["code"].as_str().unwrap();

    // No consent, no deletion.
    app.request_json(
        Method::DELETE,
        &format!("/api/v1/gift-cards/{}", id),
        Some(json!({ "consent_confirmed": false })),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;

    app.request_json(
        Method::DELETE,
        &format!("/api/v1/gift-cards/{}", id),
        Some(json!({ "consent_confirmed": true })),
        StatusCode::NO_CONTENT,
    )
    .await;

    // Both lookups observe the deletion as an explicit null, not a 404.
    let by_id = app
        .request_json(
            Method::GET,
            &format!("/api/v1/gift-cards/{}", id),
            None,
            StatusCode::OK,
        )
        .await;
    assert!(by_id.is_null());

    let by_code = app
        .request_json(
            Method::GET,
            &format!("/api/v1/gift-cards?code={}", code),
            None,
            StatusCode::OK,
        )
        .await;
    assert!(by_code.is_null());
}

#[tokio::test]
async fn issued_codes_are_unique() {
    let app = TestApp::new();
    let mut codes = std::collections::HashSet::new();
    for _ in 0..25 {
        let card = app
            .request_json(
                Method::POST,
                "/api/v1/gift-cards",
                Some(json!({ "amount": 10, "currency": "USD" })),
                StatusCode::CREATED,
            )
            .await;
        assert!(codes.insert(card["code"].as_str().unwrap().to_string()));
    }
}

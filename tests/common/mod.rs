// Not every test binary exercises every helper.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use promotions_api::{
    config::AppConfig,
    events::{self, EventSender},
    services::{checkouts::LocalOrderCollaborator, AppServices},
    store::Store,
    AppState,
};

/// Test harness wrapping the full application router over a fresh
/// in-memory store.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let store = Arc::new(Store::new());
        let services = AppServices::new(
            store.clone(),
            event_sender.clone(),
            Arc::new(LocalOrderCollaborator),
        );
        let state = AppState {
            config: AppConfig::default(),
            event_sender,
            services,
            store,
        };
        let router = promotions_api::app(state.clone());
        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };
        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends the request and decodes the JSON body, asserting the status.
    pub async fn request_json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        assert_eq!(
            status,
            expected,
            "unexpected status for {uri}: {}",
            String::from_utf8_lossy(&bytes)
        );
        if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is not valid json")
        }
    }
}

//! StreamRent backend: payment webhook intake and settlement engine
//!
//! Receives asynchronous charge notifications from the payment processor,
//! authenticates and re-verifies them, and converts each confirmed charge
//! into durable business state (wallet credit, rental grant, purchase grant)
//! plus revenue-split ledger rows and a payout queue, exactly once per
//! payment.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod payments;
pub mod settlement;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(api::webhook::handle_webhook))
        .route("/health", get(api::health::health_check))
        .route("/payments/:id/requeue", post(api::admin::requeue_payment))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

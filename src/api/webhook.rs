//! Inbound webhook endpoint
//!
//! The body is read as raw bytes and authenticated against the signature
//! header before any JSON parsing. Unauthentic requests are rejected with
//! 401 and leave no trace in the database.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;

use crate::api::AppState;
use crate::error::AppError;
use crate::settlement::types::WebhookEnvelope;

pub const SIGNATURE_HEADER: &str = "x-signature";

#[tracing::instrument(name = "webhook", skip_all, fields(event_type = tracing::field::Empty))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        warn!("webhook rejected: missing signature header");
        return Ok(unauthorized("missing signature"));
    };

    if !state.provider.validate_webhook_signature(&body, signature) {
        warn!("webhook rejected: invalid signature");
        return Ok(unauthorized("invalid signature"));
    }

    let raw_payload: serde_json::Value = serde_json::from_slice(&body)?;
    let envelope: WebhookEnvelope = serde_json::from_value(raw_payload.clone())?;

    tracing::Span::current().record("event_type", tracing::field::display(&envelope.event));

    let outcome = state.engine.process_event(&envelope, raw_payload).await?;

    Ok(Json(serde_json::json!({ "status": outcome.as_str() })).into_response())
}

fn unauthorized(reason: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": reason })),
    )
        .into_response()
}

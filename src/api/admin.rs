//! Administrative operations
//!
//! A `failed` payment has no automatic path back to `pending`. Operators
//! re-arm it here after resolving whatever made fulfillment fail; the engine
//! then re-attempts settlement immediately against the processor's verify
//! endpoint, since the original delivery already occupies the dedup table
//! and a webhook redelivery alone would be acknowledged without processing.

use axum::extract::{Path, State};
use axum::Json;

use crate::api::AppState;
use crate::error::{AppError, SettlementError};

pub async fn requeue_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Some(outcome) = state.engine.requeue_payment(&payment_id).await? else {
        return Err(SettlementError::PaymentNotFound { payment_id }.into());
    };

    Ok(Json(serde_json::json!({
        "status": "requeued",
        "settlement": outcome.as_str(),
    })))
}

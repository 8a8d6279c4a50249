use crate::database::error::DatabaseError;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Webhook event dedup record
///
/// One row per first-seen delivery, keyed by (provider, provider_event_id).
/// Rows are never mutated or deleted; the payment-status lock remains the
/// true concurrency guard for fulfillment.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub provider: String,
    pub provider_event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub received_at: chrono::DateTime<chrono::Utc>,
}

/// Repository for webhook event storage and replay detection
pub struct WebhookEventRepository {
    pool: PgPool,
}

impl WebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up a previously recorded delivery by its natural id.
    pub async fn find_by_provider_event(
        &self,
        provider: &str,
        provider_event_id: &str,
    ) -> Result<Option<WebhookEvent>, DatabaseError> {
        sqlx::query_as::<_, WebhookEvent>(
            "SELECT id, provider, provider_event_id, event_type, payload, received_at \
             FROM webhook_events WHERE provider = $1 AND provider_event_id = $2",
        )
        .bind(provider)
        .bind(provider_event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Record a first-seen delivery.
    pub async fn record_event(
        &self,
        provider: &str,
        provider_event_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<WebhookEvent, DatabaseError> {
        sqlx::query_as::<_, WebhookEvent>(
            "INSERT INTO webhook_events (id, provider, provider_event_id, event_type, payload, received_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             RETURNING id, provider, provider_event_id, event_type, payload, received_at",
        )
        .bind(Uuid::new_v4())
        .bind(provider)
        .bind(provider_event_id)
        .bind(event_type)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

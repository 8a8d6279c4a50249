use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::settlement::types::PaymentStatus;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Payment entity
///
/// The row id equals the processor's transaction reference; rows are created
/// by the checkout-initiation flow and only mutated by the settlement engine.
#[derive(Debug, Clone, FromRow)]
pub struct Payment {
    pub id: String,
    pub user_id: Uuid,
    pub amount: Decimal, // major currency units
    pub currency: String,
    pub purpose: String,
    pub status: String,
    pub provider: String,
    pub provider_reference: Option<String>,
    pub metadata: serde_json::Value,
    pub error_message: Option<String>,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

const PAYMENT_COLUMNS: &str = "id, user_id, amount, currency, purpose, status, provider, \
     provider_reference, metadata, error_message, processed_at, created_at, updated_at";

/// Repository for payment records
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Claim a pending payment for settlement.
    ///
    /// Single conditional update; the affected-row count is the lock signal.
    /// Returns false when another delivery already owns the transition.
    pub async fn try_begin_processing(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE payments SET status = $1, updated_at = NOW() \
             WHERE id = $2 AND status = $3",
        )
        .bind(PaymentStatus::Processing.as_str())
        .bind(id)
        .bind(PaymentStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    /// Finalize a settled payment with the provider reference.
    pub async fn mark_success(
        &self,
        id: &str,
        provider_reference: &str,
    ) -> Result<Payment, DatabaseError> {
        sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments \
             SET status = $1, provider_reference = $2, processed_at = NOW(), updated_at = NOW() \
             WHERE id = $3 \
             RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(PaymentStatus::Success.as_str())
        .bind(provider_reference)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if matches!(e, sqlx::Error::RowNotFound) {
                DatabaseError::new(DatabaseErrorKind::NotFound {
                    entity: "Payment".to_string(),
                    id: id.to_string(),
                })
            } else {
                DatabaseError::from_sqlx(e)
            }
        })
    }

    /// Move a payment to the terminal failed state with an error annotation.
    pub async fn mark_failed(&self, id: &str, error_message: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE payments SET status = $1, error_message = $2, updated_at = NOW() \
             WHERE id = $3",
        )
        .bind(PaymentStatus::Failed.as_str())
        .bind(error_message)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    /// Administrative requeue: re-arm a failed payment so a webhook
    /// redelivery can settle it. Conditional on the current status, so it
    /// never disturbs a payment that settled in the meantime.
    pub async fn requeue(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE payments SET status = $1, error_message = NULL, updated_at = NOW() \
             WHERE id = $2 AND status = $3",
        )
        .bind(PaymentStatus::Pending.as_str())
        .bind(id)
        .bind(PaymentStatus::Failed.as_str())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert a pending payment. The checkout flow owns this in production;
    /// integration tests use it to seed fixtures.
    pub async fn insert(&self, entity: &Payment) -> Result<Payment, DatabaseError> {
        sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments \
             (id, user_id, amount, currency, purpose, status, provider, provider_reference, \
              metadata, error_message, processed_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW()) \
             RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(&entity.id)
        .bind(entity.user_id)
        .bind(entity.amount)
        .bind(&entity.currency)
        .bind(&entity.purpose)
        .bind(&entity.status)
        .bind(&entity.provider)
        .bind(&entity.provider_reference)
        .bind(&entity.metadata)
        .bind(&entity.error_message)
        .bind(entity.processed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

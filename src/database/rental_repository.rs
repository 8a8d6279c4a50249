use crate::database::error::DatabaseError;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Rental entity: time-boxed access to a piece of content.
///
/// Rentals lapse when `expires_at` passes; expiry is a read-time check, not a
/// background sweep, so `status` alone is not sufficient to decide activity.
#[derive(Debug, Clone, FromRow)]
pub struct Rental {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content_id: String,
    pub content_type: String,
    pub amount_paid: Decimal,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Repository for rental grants
pub struct RentalRepository {
    pool: PgPool,
}

impl RentalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an active, unexpired rental for a (user, content) pair.
    pub async fn find_active(
        &self,
        user_id: Uuid,
        content_id: &str,
    ) -> Result<Option<Rental>, DatabaseError> {
        sqlx::query_as::<_, Rental>(
            "SELECT id, user_id, content_id, content_type, amount_paid, expires_at, status, created_at \
             FROM rentals \
             WHERE user_id = $1 AND content_id = $2 AND status = 'active' AND expires_at > NOW()",
        )
        .bind(user_id)
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        content_id: &str,
        content_type: &str,
        amount_paid: Decimal,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Rental, DatabaseError> {
        sqlx::query_as::<_, Rental>(
            "INSERT INTO rentals (id, user_id, content_id, content_type, amount_paid, expires_at, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 'active', NOW()) \
             RETURNING id, user_id, content_id, content_type, amount_paid, expires_at, status, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(content_id)
        .bind(content_type)
        .bind(amount_paid)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

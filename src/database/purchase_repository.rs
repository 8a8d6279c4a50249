use crate::database::error::DatabaseError;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Purchase entity: permanent access to a piece of content.
/// At most one purchase exists per (user, content) pair; rows are immutable.
#[derive(Debug, Clone, FromRow)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content_id: String,
    pub content_type: String,
    pub amount_paid: Decimal,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Repository for purchase grants
pub struct PurchaseRepository {
    pool: PgPool,
}

impl PurchaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_user_content(
        &self,
        user_id: Uuid,
        content_id: &str,
    ) -> Result<Option<Purchase>, DatabaseError> {
        sqlx::query_as::<_, Purchase>(
            "SELECT id, user_id, content_id, content_type, amount_paid, created_at \
             FROM purchases WHERE user_id = $1 AND content_id = $2",
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
    ) -> Result<Purchase, DatabaseError> {
        sqlx::query_as::<_, Purchase>(
            "INSERT INTO purchases (id, user_id, content_id, content_type, amount_paid, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             RETURNING id, user_id, content_id, content_type, amount_paid, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(content_id)
        .bind(content_type)
        .bind(amount_paid)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

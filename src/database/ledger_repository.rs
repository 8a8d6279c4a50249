use crate::database::error::DatabaseError;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Ledger entry: attributes a portion of a settled payment to a party.
/// Entries for one payment always sum to the settled amount.
#[derive(Debug, Clone, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub payment_id: String,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub party: String,
    pub party_id: Option<Uuid>,
    pub description: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Payout: a producer's queued disbursement, advanced later by the
/// out-of-process payout manager.
#[derive(Debug, Clone, FromRow)]
pub struct Payout {
    pub id: Uuid,
    pub producer_id: Uuid,
    pub amount: Decimal,
    pub status: String,
    pub payout_date: Option<chrono::DateTime<chrono::Utc>>,
    pub metadata: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Repository for the revenue ledger and the payout queue
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record_entry(
        &self,
        payment_id: &str,
        user_id: Uuid,
        amount: Decimal,
        party: &str,
        party_id: Option<Uuid>,
        description: &str,
    ) -> Result<LedgerEntry, DatabaseError> {
        sqlx::query_as::<_, LedgerEntry>(
            "INSERT INTO ledger_entries \
             (id, payment_id, user_id, amount, party, party_id, description, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) \
             RETURNING id, payment_id, user_id, amount, party, party_id, description, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(payment_id)
        .bind(user_id)
        .bind(amount)
        .bind(party)
        .bind(party_id)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn enqueue_payout(
        &self,
        producer_id: Uuid,
        amount: Decimal,
        metadata: serde_json::Value,
    ) -> Result<Payout, DatabaseError> {
        sqlx::query_as::<_, Payout>(
            "INSERT INTO payouts (id, producer_id, amount, status, metadata, created_at) \
             VALUES ($1, $2, $3, 'queued', $4, NOW()) \
             RETURNING id, producer_id, amount, status, payout_date, metadata, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(producer_id)
        .bind(amount)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn entries_for_payment(
        &self,
        payment_id: &str,
    ) -> Result<Vec<LedgerEntry>, DatabaseError> {
        sqlx::query_as::<_, LedgerEntry>(
            "SELECT id, payment_id, user_id, amount, party, party_id, description, created_at \
             FROM ledger_entries WHERE payment_id = $1 ORDER BY created_at ASC",
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

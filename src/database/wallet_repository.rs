use crate::database::error::DatabaseError;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Wallet entity
///
/// The balance is only ever mutated through [`WalletRepository::credit`], so
/// it always equals the sum of the user's wallet transactions.
#[derive(Debug, Clone, FromRow)]
pub struct Wallet {
    pub user_id: Uuid,
    pub balance: Decimal,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Append-only record of a wallet balance change
#[derive(Debug, Clone, FromRow)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub transaction_type: String,
    pub description: String,
    pub payment_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Repository for wallet balances and their transaction log
pub struct WalletRepository {
    pool: PgPool,
}

impl WalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<Wallet>, DatabaseError> {
        sqlx::query_as::<_, Wallet>(
            "SELECT user_id, balance, created_at, updated_at FROM wallets WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Atomically credit a wallet and record the transaction.
    ///
    /// The balance change is a single upsert-increment statement, never a
    /// read-modify-write, so concurrent credits to the same wallet compose.
    /// The transaction row is written in the same database transaction.
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        description: &str,
        payment_id: Option<&str>,
    ) -> Result<WalletTransaction, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        sqlx::query(
            "INSERT INTO wallets (user_id, balance, created_at, updated_at) \
             VALUES ($1, $2, NOW(), NOW()) \
             ON CONFLICT (user_id) \
             DO UPDATE SET balance = wallets.balance + EXCLUDED.balance, updated_at = NOW()",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let record = sqlx::query_as::<_, WalletTransaction>(
            "INSERT INTO wallet_transactions \
             (id, user_id, amount, transaction_type, description, payment_id, created_at) \
             VALUES ($1, $2, $3, 'credit', $4, $5, NOW()) \
             RETURNING id, user_id, amount, transaction_type, description, payment_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(amount)
        .bind(description)
        .bind(payment_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        Ok(record)
    }

    pub async fn transactions_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<WalletTransaction>, DatabaseError> {
        sqlx::query_as::<_, WalletTransaction>(
            "SELECT id, user_id, amount, transaction_type, description, payment_id, created_at \
             FROM wallet_transactions WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

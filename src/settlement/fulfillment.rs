//! Purpose-specific fulfillment handlers
//!
//! Each handler is idempotent against its own table: an existing grant makes
//! the handler a no-op instead of an error, so a re-attempt with a fresh
//! payment id pointing at the same content cannot double-grant.

use chrono::{Duration, Utc};
use tracing::info;

use crate::database::payment_repository::Payment;
use crate::database::purchase_repository::PurchaseRepository;
use crate::database::rental_repository::RentalRepository;
use crate::database::wallet_repository::WalletRepository;
use crate::error::AppResult;
use crate::settlement::types::{PurchaseMetadata, PurposeMetadata, RentalMetadata};

/// Dispatches a settled payment to the handler its purpose requires.
pub struct PurposeFulfillment {
    wallets: WalletRepository,
    rentals: RentalRepository,
    purchases: PurchaseRepository,
}

impl PurposeFulfillment {
    pub fn new(
        wallets: WalletRepository,
        rentals: RentalRepository,
        purchases: PurchaseRepository,
    ) -> Self {
        Self {
            wallets,
            rentals,
            purchases,
        }
    }

    /// Errors propagate to the caller, which reverts the payment to `failed`.
    pub async fn fulfill(&self, payment: &Payment, metadata: &PurposeMetadata) -> AppResult<()> {
        match metadata {
            PurposeMetadata::WalletTopup => self.fulfill_topup(payment).await,
            PurposeMetadata::Rental(meta) => self.fulfill_rental(payment, meta).await,
            PurposeMetadata::Purchase(meta) => self.fulfill_purchase(payment, meta).await,
        }
    }

    async fn fulfill_topup(&self, payment: &Payment) -> AppResult<()> {
        let record = self
            .wallets
            .credit(
                payment.user_id,
                payment.amount,
                &format!("Wallet top-up via {}", payment.provider),
                Some(&payment.id),
            )
            .await?;

        info!(
            payment_id = %payment.id,
            user_id = %payment.user_id,
            amount = %payment.amount,
            transaction_id = %record.id,
            "wallet credited"
        );
        Ok(())
    }

    async fn fulfill_rental(&self, payment: &Payment, meta: &RentalMetadata) -> AppResult<()> {
        if let Some(existing) = self
            .rentals
            .find_active(payment.user_id, &meta.content_id)
            .await?
        {
            info!(
                payment_id = %payment.id,
                rental_id = %existing.id,
                content_id = %meta.content_id,
                "active rental already exists, skipping grant"
            );
            return Ok(());
        }

        let expires_at = Utc::now() + Duration::hours(meta.rental_duration);
        let rental = self
            .rentals
            .create(
                payment.user_id,
                &meta.content_id,
                &meta.content_type,
                payment.amount,
                expires_at,
            )
            .await?;

        info!(
            payment_id = %payment.id,
            rental_id = %rental.id,
            content_id = %meta.content_id,
            expires_at = %expires_at,
            "rental granted"
        );
        Ok(())
    }

    async fn fulfill_purchase(&self, payment: &Payment, meta: &PurchaseMetadata) -> AppResult<()> {
        if let Some(existing) = self
            .purchases
            .find_by_user_content(payment.user_id, &meta.content_id)
            .await?
        {
            info!(
                payment_id = %payment.id,
                purchase_id = %existing.id,
                content_id = %meta.content_id,
                "purchase already exists, skipping grant"
            );
            return Ok(());
        }

        let purchase = self
            .purchases
            .create(
                payment.user_id,
                &meta.content_id,
                &meta.content_type,
                payment.amount,
            )
            .await?;

        info!(
            payment_id = %payment.id,
            purchase_id = %purchase.id,
            content_id = %meta.content_id,
            "purchase granted"
        );
        Ok(())
    }
}

//! Payment provider trait definitions

use crate::error::AppResult;
use crate::payments::types::VerifiedTransaction;
use async_trait::async_trait;

/// Interface the settlement engine requires from a payment processor.
///
/// Checkout initiation and payout disbursement live in other services; this
/// core only authenticates webhooks and re-verifies charges server-side.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Stable provider name used for dedup keys and payment rows.
    fn name(&self) -> &'static str;

    /// Fetch the authoritative status and amount for a transaction.
    ///
    /// Called for every settlement attempt; webhook-embedded amount and
    /// status fields are never trusted.
    async fn verify_transaction(&self, reference: &str) -> AppResult<VerifiedTransaction>;

    /// Validate the signature header of an inbound webhook against the raw
    /// request body. Returns true iff the payload is authentic.
    fn validate_webhook_signature(&self, payload: &[u8], signature: &str) -> bool;
}

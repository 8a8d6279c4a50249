//! Settlement state machine
//!
//! Control flow per delivery: dedup check -> remote charge verification ->
//! amount cross-check -> conditional-update lock -> fulfillment -> ledger ->
//! final success write. The conditional update is the only mutual-exclusion
//! primitive; everything downstream of it runs at most once per payment.

use std::str::FromStr;
use std::sync::Arc;

use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::config::SettlementConfig;
use crate::database::ledger_repository::LedgerRepository;
use crate::database::payment_repository::{Payment, PaymentRepository};
use crate::database::purchase_repository::PurchaseRepository;
use crate::database::rental_repository::RentalRepository;
use crate::database::wallet_repository::WalletRepository;
use crate::database::webhook_repository::WebhookEventRepository;
use crate::error::{AppResult, SettlementError};
use crate::payments::traits::PaymentProvider;
use crate::settlement::fulfillment::PurposeFulfillment;
use crate::settlement::ledger::{LedgerGenerator, RevenueSplit};
use crate::settlement::types::{
    to_minor_units, PaymentPurpose, PurposeMetadata, WebhookEnvelope,
};

/// How a delivery was handled. Everything here is acknowledged with 200;
/// errors surface separately as `AppError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Fulfillment and ledger generation ran; payment is `success`.
    Settled,
    /// This (provider, event id) was already recorded.
    DuplicateEvent,
    /// Another delivery holds the `processing` lock.
    AlreadyClaimed,
    /// No payment row matches the charge reference.
    UnknownPayment,
    /// Remote verification did not report success; payment left untouched.
    Unverified,
    /// Payment moved to `failed` (amount mismatch or processor-reported).
    MarkedFailed,
    /// Event type this engine does not act on.
    Ignored,
}

impl SettlementOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementOutcome::Settled => "settled",
            SettlementOutcome::DuplicateEvent => "duplicate",
            SettlementOutcome::AlreadyClaimed => "already_processing",
            SettlementOutcome::UnknownPayment => "unknown_reference",
            SettlementOutcome::Unverified => "unverified",
            SettlementOutcome::MarkedFailed => "failed",
            SettlementOutcome::Ignored => "ignored",
        }
    }
}

/// The settlement engine. One instance serves all deliveries; all shared
/// mutable state lives in the database.
pub struct SettlementEngine {
    provider: Arc<dyn PaymentProvider>,
    payments: PaymentRepository,
    events: WebhookEventRepository,
    fulfillment: PurposeFulfillment,
    ledger: LedgerGenerator,
}

impl SettlementEngine {
    pub fn new(
        pool: PgPool,
        provider: Arc<dyn PaymentProvider>,
        settlement: &SettlementConfig,
    ) -> Self {
        let fulfillment = PurposeFulfillment::new(
            WalletRepository::new(pool.clone()),
            RentalRepository::new(pool.clone()),
            PurchaseRepository::new(pool.clone()),
        );
        let ledger = LedgerGenerator::new(
            LedgerRepository::new(pool.clone()),
            RevenueSplit::new(settlement.platform_commission_rate),
        );

        Self {
            provider,
            payments: PaymentRepository::new(pool.clone()),
            events: WebhookEventRepository::new(pool),
            fulfillment,
            ledger,
        }
    }

    /// Process one authenticated webhook delivery.
    pub async fn process_event(
        &self,
        envelope: &WebhookEnvelope,
        raw_payload: serde_json::Value,
    ) -> AppResult<SettlementOutcome> {
        let provider = self.provider.name();
        let natural_id = envelope.natural_id();

        // Fast-path replay detection. Two deliveries can race past this
        // check; the processing lock below is the real guard.
        if self
            .events
            .find_by_provider_event(provider, natural_id)
            .await?
            .is_some()
        {
            info!(
                provider,
                event_id = natural_id,
                event_type = %envelope.event,
                "duplicate webhook event, acknowledging without processing"
            );
            return Ok(SettlementOutcome::DuplicateEvent);
        }

        self.events
            .record_event(provider, natural_id, &envelope.event, raw_payload)
            .await?;

        match envelope.event.as_str() {
            "charge.success" => match envelope.data.reference.as_deref() {
                Some(reference) => self.settle_charge(reference).await,
                None => {
                    warn!(event_type = %envelope.event, "charge event without reference");
                    Ok(SettlementOutcome::Ignored)
                }
            },
            "charge.failed" => self.handle_processor_failure(envelope).await,
            other => {
                info!(event_type = other, "unhandled webhook event type");
                Ok(SettlementOutcome::Ignored)
            }
        }
    }

    /// Settle a successful charge: verify remotely, cross-check the amount,
    /// take the processing lock, fulfill, write the ledger, mark success.
    async fn settle_charge(&self, reference: &str) -> AppResult<SettlementOutcome> {
        let Some(payment) = self.payments.find_by_id(reference).await? else {
            warn!(reference, "webhook for unknown payment reference");
            return Ok(SettlementOutcome::UnknownPayment);
        };

        // The webhook body is never trusted for status or amount.
        let verified = self.provider.verify_transaction(reference).await?;
        if !verified.is_successful() {
            warn!(
                payment_id = %payment.id,
                verified_status = %verified.status,
                "remote verification not successful, leaving payment untouched"
            );
            return Ok(SettlementOutcome::Unverified);
        }

        let expected_minor =
            to_minor_units(payment.amount).ok_or_else(|| SettlementError::InvalidMetadata {
                message: format!("payment amount {} not representable", payment.amount),
            })?;
        if verified.amount_minor != expected_minor {
            let err = SettlementError::AmountMismatch {
                payment_id: payment.id.clone(),
                expected: expected_minor,
                actual: verified.amount_minor,
            };
            error!(payment_id = %payment.id, "{}", err);
            self.payments
                .mark_failed(&payment.id, &err.to_string())
                .await?;
            return Ok(SettlementOutcome::MarkedFailed);
        }

        // Lock acquisition. Zero rows updated means another delivery owns
        // this payment; abort silently.
        if !self.payments.try_begin_processing(&payment.id).await? {
            info!(
                payment_id = %payment.id,
                "payment not pending, another delivery claimed it"
            );
            return Ok(SettlementOutcome::AlreadyClaimed);
        }

        match self.run_fulfillment(&payment).await {
            Ok(()) => {
                self.payments.mark_success(&payment.id, reference).await?;
                info!(payment_id = %payment.id, "payment settled");
                Ok(SettlementOutcome::Settled)
            }
            Err(err) => {
                // Never leave a payment stuck in `processing`. Revert to the
                // terminal failed state, then re-raise the original error.
                error!(payment_id = %payment.id, "fulfillment failed: {}", err);
                if let Err(revert_err) =
                    self.payments.mark_failed(&payment.id, &err.to_string()).await
                {
                    error!(
                        payment_id = %payment.id,
                        "failed to revert payment after fulfillment error: {}",
                        revert_err
                    );
                }
                Err(err)
            }
        }
    }

    async fn run_fulfillment(&self, payment: &Payment) -> AppResult<()> {
        let purpose = PaymentPurpose::from_str(&payment.purpose)?;
        let metadata = PurposeMetadata::decode(purpose, &payment.metadata)?;

        self.fulfillment.fulfill(payment, &metadata).await?;
        self.ledger.generate(payment, &metadata).await?;
        Ok(())
    }

    /// Processor-reported failure: mark the payment failed directly, no
    /// verification round trip or fulfillment involved.
    async fn handle_processor_failure(
        &self,
        envelope: &WebhookEnvelope,
    ) -> AppResult<SettlementOutcome> {
        let Some(reference) = envelope.data.reference.as_deref() else {
            warn!("charge.failed event without reference");
            return Ok(SettlementOutcome::Ignored);
        };

        if self.payments.find_by_id(reference).await?.is_none() {
            warn!(reference, "charge.failed for unknown payment reference");
            return Ok(SettlementOutcome::UnknownPayment);
        }

        let message = envelope
            .data
            .gateway_response
            .as_deref()
            .unwrap_or("payment failed at processor");
        self.payments.mark_failed(reference, message).await?;

        info!(payment_id = reference, reason = message, "payment marked failed");
        Ok(SettlementOutcome::MarkedFailed)
    }

    /// Administrative requeue: re-arm a `failed` payment as `pending` and
    /// immediately re-attempt settlement against the verify endpoint. The
    /// dedup table already holds the original delivery, so a webhook
    /// redelivery could never reach the settlement path on its own.
    ///
    /// Returns `None` when the payment is missing or not in `failed`,
    /// otherwise the outcome of the settlement attempt. An attempt that
    /// cannot verify leaves the payment `pending` for another requeue.
    pub async fn requeue_payment(&self, payment_id: &str) -> AppResult<Option<SettlementOutcome>> {
        if !self.payments.requeue(payment_id).await? {
            warn!(payment_id, "requeue refused: payment missing or not failed");
            return Ok(None);
        }

        info!(payment_id, "payment requeued, re-attempting settlement");
        let outcome = self.settle_charge(payment_id).await?;
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels_are_stable() {
        // These strings are the webhook response contract.
        assert_eq!(SettlementOutcome::Settled.as_str(), "settled");
        assert_eq!(SettlementOutcome::DuplicateEvent.as_str(), "duplicate");
        assert_eq!(SettlementOutcome::AlreadyClaimed.as_str(), "already_processing");
        assert_eq!(SettlementOutcome::UnknownPayment.as_str(), "unknown_reference");
        assert_eq!(SettlementOutcome::Unverified.as_str(), "unverified");
        assert_eq!(SettlementOutcome::MarkedFailed.as_str(), "failed");
        assert_eq!(SettlementOutcome::Ignored.as_str(), "ignored");
    }
}

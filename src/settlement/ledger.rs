//! Revenue split, ledger rows and payout queue

use rust_decimal::Decimal;
use tracing::info;

use crate::database::ledger_repository::LedgerRepository;
use crate::database::payment_repository::Payment;
use crate::error::AppResult;
use crate::settlement::types::PurposeMetadata;

pub const PARTY_PLATFORM: &str = "platform";
pub const PARTY_PRODUCER: &str = "producer";

/// Fixed revenue split between the platform and the content producer.
///
/// The platform share is rounded to 2 decimal places; the producer share is
/// the remainder, so the two always sum exactly to the payment amount.
#[derive(Debug, Clone, Copy)]
pub struct RevenueSplit {
    platform_rate: Decimal,
}

impl RevenueSplit {
    pub fn new(platform_rate: Decimal) -> Self {
        Self { platform_rate }
    }

    pub fn split(&self, amount: Decimal) -> (Decimal, Decimal) {
        let platform = (amount * self.platform_rate).round_dp(2);
        let producer = amount - platform;
        (platform, producer)
    }
}

/// Writes the accounting trail for a settled payment.
pub struct LedgerGenerator {
    ledger: LedgerRepository,
    split: RevenueSplit,
}

impl LedgerGenerator {
    pub fn new(ledger: LedgerRepository, split: RevenueSplit) -> Self {
        Self { ledger, split }
    }

    /// Record ledger entries for a settled payment and, when the metadata
    /// names a producer, enqueue their payout. Runs strictly after
    /// fulfillment succeeded and before the final success write.
    pub async fn generate(&self, payment: &Payment, metadata: &PurposeMetadata) -> AppResult<()> {
        let (platform_share, producer_share) = self.split.split(payment.amount);

        self.ledger
            .record_entry(
                &payment.id,
                payment.user_id,
                platform_share,
                PARTY_PLATFORM,
                None,
                &format!("Platform commission for payment {}", payment.id),
            )
            .await?;

        let Some(producer_id) = metadata.producer_id() else {
            info!(
                payment_id = %payment.id,
                %platform_share,
                "ledger written, no producer on payment"
            );
            return Ok(());
        };

        self.ledger
            .record_entry(
                &payment.id,
                payment.user_id,
                producer_share,
                PARTY_PRODUCER,
                Some(producer_id),
                &format!("Producer share for payment {}", payment.id),
            )
            .await?;

        let payout_metadata = match metadata.content_ref() {
            Some((content_id, content_type)) => serde_json::json!({
                "payment_id": payment.id,
                "content_id": content_id,
                "content_type": content_type,
            }),
            None => serde_json::json!({ "payment_id": payment.id }),
        };

        let payout = self
            .ledger
            .enqueue_payout(producer_id, producer_share, payout_metadata)
            .await?;

        info!(
            payment_id = %payment.id,
            %platform_share,
            %producer_share,
            payout_id = %payout.id,
            "ledger written, payout queued"
        );

        Ok(())
    }
}

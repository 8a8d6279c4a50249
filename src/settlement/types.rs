//! Settlement domain types
//!
//! Webhook payloads and payment metadata arrive as loosely-typed JSON; this
//! module is the boundary where they become typed values. Purpose metadata is
//! a tagged union with one shape per purpose, validated before dispatch.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::SettlementError;

/// Payment lifecycle status
///
/// Transitions are one-directional: `pending -> processing -> success`, with
/// `processing -> failed` on fulfillment errors and a direct edge to `failed`
/// for processor-reported failures. `failed` is terminal except through the
/// administrative requeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "success" => Ok(PaymentStatus::Success),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(SettlementError::InvalidMetadata {
                message: format!("unknown payment status '{}'", other),
            }),
        }
    }
}

/// What a payment buys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    WalletTopup,
    Rental,
    Purchase,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPurpose::WalletTopup => "wallet_topup",
            PaymentPurpose::Rental => "rental",
            PaymentPurpose::Purchase => "purchase",
        }
    }
}

impl fmt::Display for PaymentPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentPurpose {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wallet_topup" => Ok(PaymentPurpose::WalletTopup),
            "rental" => Ok(PaymentPurpose::Rental),
            "purchase" => Ok(PaymentPurpose::Purchase),
            other => Err(SettlementError::InvalidMetadata {
                message: format!("unknown payment purpose '{}'", other),
            }),
        }
    }
}

pub const DEFAULT_RENTAL_DURATION_HOURS: i64 = 48;

fn default_rental_duration() -> i64 {
    DEFAULT_RENTAL_DURATION_HOURS
}

/// Metadata attached to a rental payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalMetadata {
    pub content_id: String,
    pub content_type: String,
    /// Rental window in hours
    #[serde(default = "default_rental_duration")]
    pub rental_duration: i64,
    #[serde(default)]
    pub producer_id: Option<Uuid>,
}

/// Metadata attached to a purchase payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseMetadata {
    pub content_id: String,
    pub content_type: String,
    #[serde(default)]
    pub producer_id: Option<Uuid>,
}

/// Purpose-specific payment metadata, validated at the boundary
#[derive(Debug, Clone)]
pub enum PurposeMetadata {
    WalletTopup,
    Rental(RentalMetadata),
    Purchase(PurchaseMetadata),
}

impl PurposeMetadata {
    /// Decode the raw metadata column into the shape its purpose requires.
    pub fn decode(
        purpose: PaymentPurpose,
        raw: &serde_json::Value,
    ) -> Result<Self, SettlementError> {
        match purpose {
            PaymentPurpose::WalletTopup => Ok(PurposeMetadata::WalletTopup),
            PaymentPurpose::Rental => serde_json::from_value(raw.clone())
                .map(PurposeMetadata::Rental)
                .map_err(|e| SettlementError::InvalidMetadata {
                    message: format!("rental metadata: {}", e),
                }),
            PaymentPurpose::Purchase => serde_json::from_value(raw.clone())
                .map(PurposeMetadata::Purchase)
                .map_err(|e| SettlementError::InvalidMetadata {
                    message: format!("purchase metadata: {}", e),
                }),
        }
    }

    pub fn producer_id(&self) -> Option<Uuid> {
        match self {
            PurposeMetadata::WalletTopup => None,
            PurposeMetadata::Rental(m) => m.producer_id,
            PurposeMetadata::Purchase(m) => m.producer_id,
        }
    }

    pub fn content_ref(&self) -> Option<(&str, &str)> {
        match self {
            PurposeMetadata::WalletTopup => None,
            PurposeMetadata::Rental(m) => Some((&m.content_id, &m.content_type)),
            PurposeMetadata::Purchase(m) => Some((&m.content_id, &m.content_type)),
        }
    }
}

/// Inbound webhook envelope: `{ event, data: { reference, amount, ... } }`
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: ChargeData,
}

impl WebhookEnvelope {
    /// Natural dedup id: the charge reference, falling back to the event type.
    pub fn natural_id(&self) -> &str {
        self.data.reference.as_deref().unwrap_or(&self.event)
    }
}

/// Charge fields the processor embeds in the webhook body. Amount and status
/// here are informational only; the verify endpoint is authoritative.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChargeData {
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<String>,
}

/// Convert a major-unit decimal amount to minor units (kobo, cents).
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::from(100)).round().to_i64()
}

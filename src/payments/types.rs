//! Payment provider types

use serde::{Deserialize, Serialize};

/// Authoritative charge state returned by the processor's verify endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifiedTransaction {
    /// Processor-reported status string ("success", "failed", "abandoned", ...)
    pub status: String,
    /// Charge amount in minor currency units (kobo, cents)
    pub amount_minor: i64,
    /// Currency code (NGN, GHS, ...)
    pub currency: String,
    /// Human-readable gateway response, useful as a failure annotation
    pub gateway_response: Option<String>,
    pub paid_at: Option<String>,
    pub channel: Option<String>,
}

impl VerifiedTransaction {
    pub fn is_successful(&self) -> bool {
        self.status == "success"
    }
}

//! Payment processor integration module
//!
//! Server-side verification of charges and authentication of inbound
//! webhooks. Settlement never trusts fields embedded in a webhook body; the
//! processor's verify endpoint is the source of truth.

pub mod providers;
pub mod traits;
pub mod types;

//! Webhook-driven settlement engine
//!
//! Converts verified charges into durable business state: wallet credits,
//! rental and purchase grants, revenue ledger rows and queued payouts.
//! Each payment settles exactly once, even under duplicate or concurrent
//! deliveries.

pub mod engine;
pub mod fulfillment;
pub mod ledger;
pub mod types;

pub use engine::{SettlementEngine, SettlementOutcome};

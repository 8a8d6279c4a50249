//! Payment provider implementations
//!
//! Concrete implementations of the PaymentProvider trait.

pub mod paystack;

pub use paystack::PaystackProvider;

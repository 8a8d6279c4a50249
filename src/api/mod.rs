//! HTTP surface: webhook intake, health, administrative requeue

pub mod admin;
pub mod health;
pub mod webhook;

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::payments::traits::PaymentProvider;
use crate::settlement::SettlementEngine;

/// Shared state for all handlers. Per-request handling is stateless; the
/// database is the only shared mutable store.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pool: PgPool,
    pub provider: Arc<dyn PaymentProvider>,
    pub engine: Arc<SettlementEngine>,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool, provider: Arc<dyn PaymentProvider>) -> Self {
        let engine = Arc::new(SettlementEngine::new(
            pool.clone(),
            provider.clone(),
            &config.settlement,
        ));

        Self {
            config,
            pool,
            provider,
            engine,
        }
    }
}

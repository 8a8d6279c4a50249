//! Integration tests for the settlement engine
//!
//! These tests require a running Postgres with the migrations applied.
//! Run with: DATABASE_URL=postgres://... cargo test --test settlement_flow_test -- --ignored

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use streamrent_backend::config::SettlementConfig;
use streamrent_backend::database::ledger_repository::LedgerRepository;
use streamrent_backend::database::payment_repository::{Payment, PaymentRepository};
use streamrent_backend::database::rental_repository::RentalRepository;
use streamrent_backend::database::wallet_repository::WalletRepository;
use streamrent_backend::database::{init_pool, PoolConfig};
use streamrent_backend::error::AppResult;
use streamrent_backend::payments::traits::PaymentProvider;
use streamrent_backend::payments::types::VerifiedTransaction;
use streamrent_backend::settlement::types::WebhookEnvelope;
use streamrent_backend::settlement::{SettlementEngine, SettlementOutcome};

/// Provider stub returning a canned verification result, so tests control
/// what the "processor" reports independently of the webhook body.
struct StubProvider {
    status: String,
    amount_minor: i64,
}

impl StubProvider {
    fn successful(amount_minor: i64) -> Self {
        Self {
            status: "success".to_string(),
            amount_minor,
        }
    }
}

#[async_trait]
impl PaymentProvider for StubProvider {
    fn name(&self) -> &'static str {
        "paystack"
    }

    async fn verify_transaction(&self, _reference: &str) -> AppResult<VerifiedTransaction> {
        Ok(VerifiedTransaction {
            status: self.status.clone(),
            amount_minor: self.amount_minor,
            currency: "NGN".to_string(),
            gateway_response: None,
            paid_at: None,
            channel: Some("card".to_string()),
        })
    }

    fn validate_webhook_signature(&self, _payload: &[u8], _signature: &str) -> bool {
        true
    }
}

async fn setup_db() -> sqlx::PgPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    init_pool(&database_url, Some(PoolConfig::default()))
        .await
        .expect("Failed to init DB pool")
}

fn engine_with(pool: sqlx::PgPool, provider: StubProvider) -> SettlementEngine {
    let settlement = SettlementConfig {
        platform_commission_rate: Decimal::new(30, 2),
    };
    SettlementEngine::new(pool, Arc::new(provider), &settlement)
}

fn charge_success_envelope(reference: &str, amount_minor: i64) -> (WebhookEnvelope, serde_json::Value) {
    let raw = serde_json::json!({
        "event": "charge.success",
        "data": {
            "reference": reference,
            "amount": amount_minor,
            "status": "success",
        }
    });
    let envelope: WebhookEnvelope = serde_json::from_value(raw.clone()).unwrap();
    (envelope, raw)
}

async fn seed_payment(
    pool: &sqlx::PgPool,
    id: &str,
    purpose: &str,
    amount: Decimal,
    metadata: serde_json::Value,
) -> Payment {
    let payments = PaymentRepository::new(pool.clone());
    let payment = Payment {
        id: id.to_string(),
        user_id: Uuid::new_v4(),
        amount,
        currency: "NGN".to_string(),
        purpose: purpose.to_string(),
        status: "pending".to_string(),
        provider: "paystack".to_string(),
        provider_reference: None,
        metadata,
        error_message: None,
        processed_at: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    payments.insert(&payment).await.expect("seed payment")
}

fn unique_ref(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore] // Requires database running
async fn rental_settlement_grants_access_and_splits_revenue() {
    let pool = setup_db().await;
    let reference = unique_ref("pay_rental");
    let producer = Uuid::new_v4();

    let payment = seed_payment(
        &pool,
        &reference,
        "rental",
        Decimal::from(5000),
        serde_json::json!({
            "content_id": "c1",
            "content_type": "movie",
            "rental_duration": 48,
            "producer_id": producer,
        }),
    )
    .await;

    let engine = engine_with(pool.clone(), StubProvider::successful(500000));
    let (envelope, raw) = charge_success_envelope(&reference, 500000);

    let outcome = engine.process_event(&envelope, raw).await.unwrap();
    assert_eq!(outcome, SettlementOutcome::Settled);

    let settled = PaymentRepository::new(pool.clone())
        .find_by_id(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settled.status, "success");
    assert!(settled.processed_at.is_some());

    let rental = RentalRepository::new(pool.clone())
        .find_active(payment.user_id, "c1")
        .await
        .unwrap()
        .expect("active rental");
    let hours_left = (rental.expires_at - chrono::Utc::now()).num_hours();
    assert!((46..=48).contains(&hours_left), "expiry ~48h, got {}", hours_left);

    let entries = LedgerRepository::new(pool)
        .entries_for_payment(&reference)
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    let total: Decimal = entries.iter().map(|e| e.amount).sum();
    assert_eq!(total, Decimal::from(5000));
    let platform = entries.iter().find(|e| e.party == "platform").unwrap();
    let producer_entry = entries.iter().find(|e| e.party == "producer").unwrap();
    assert_eq!(platform.amount, Decimal::from(1500));
    assert_eq!(producer_entry.amount, Decimal::from(3500));
    assert_eq!(producer_entry.party_id, Some(producer));
}

#[tokio::test]
#[ignore] // Requires database running
async fn duplicate_delivery_settles_exactly_once() {
    let pool = setup_db().await;
    let reference = unique_ref("pay_dup");

    let payment = seed_payment(
        &pool,
        &reference,
        "rental",
        Decimal::from(5000),
        serde_json::json!({"content_id": "c2", "content_type": "movie"}),
    )
    .await;

    let engine = engine_with(pool.clone(), StubProvider::successful(500000));
    let (envelope, raw) = charge_success_envelope(&reference, 500000);

    let first = engine.process_event(&envelope, raw.clone()).await.unwrap();
    assert_eq!(first, SettlementOutcome::Settled);

    let second = engine.process_event(&envelope, raw).await.unwrap();
    assert_eq!(second, SettlementOutcome::DuplicateEvent);

    let settled = PaymentRepository::new(pool.clone())
        .find_by_id(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settled.status, "success");

    let rentals: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM rentals WHERE user_id = $1 AND content_id = $2")
            .bind(payment.user_id)
            .bind("c2")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(rentals, 1);

    let entries = LedgerRepository::new(pool)
        .entries_for_payment(&reference)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1); // platform only, no producer in metadata
}

#[tokio::test]
#[ignore] // Requires database running
async fn concurrent_claims_only_one_wins() {
    let pool = setup_db().await;
    let reference = unique_ref("pay_race");

    seed_payment(
        &pool,
        &reference,
        "purchase",
        Decimal::from(100),
        serde_json::json!({"content_id": "c3", "content_type": "movie"}),
    )
    .await;

    let repo_a = PaymentRepository::new(pool.clone());
    let repo_b = PaymentRepository::new(pool.clone());
    let ref_a = reference.clone();
    let ref_b = reference.clone();

    let (a, b) = tokio::join!(
        tokio::spawn(async move { repo_a.try_begin_processing(&ref_a).await.unwrap() }),
        tokio::spawn(async move { repo_b.try_begin_processing(&ref_b).await.unwrap() }),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a ^ b, "exactly one claim must succeed, got a={} b={}", a, b);
}

#[tokio::test]
#[ignore] // Requires database running
async fn amount_mismatch_fails_without_fulfillment() {
    let pool = setup_db().await;
    let reference = unique_ref("pay_mismatch");

    let payment = seed_payment(
        &pool,
        &reference,
        "rental",
        Decimal::from(5000),
        serde_json::json!({"content_id": "c4", "content_type": "movie"}),
    )
    .await;

    // Processor reports 100000 kobo against an expected 500000.
    let engine = engine_with(pool.clone(), StubProvider::successful(100000));
    let (envelope, raw) = charge_success_envelope(&reference, 100000);

    let outcome = engine.process_event(&envelope, raw).await.unwrap();
    assert_eq!(outcome, SettlementOutcome::MarkedFailed);

    let failed = PaymentRepository::new(pool.clone())
        .find_by_id(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, "failed");
    assert!(failed.error_message.unwrap().contains("amount mismatch"));

    let rental = RentalRepository::new(pool.clone())
        .find_active(payment.user_id, "c4")
        .await
        .unwrap();
    assert!(rental.is_none());

    let entries = LedgerRepository::new(pool)
        .entries_for_payment(&reference)
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
#[ignore] // Requires database running
async fn existing_active_rental_makes_fulfillment_a_noop() {
    let pool = setup_db().await;
    let reference = unique_ref("pay_rental_noop");

    let payment = seed_payment(
        &pool,
        &reference,
        "rental",
        Decimal::from(2000),
        serde_json::json!({"content_id": "c5", "content_type": "movie"}),
    )
    .await;

    // Pre-existing active rental for the same (user, content).
    RentalRepository::new(pool.clone())
        .create(
            payment.user_id,
            "c5",
            "movie",
            Decimal::from(2000),
            chrono::Utc::now() + chrono::Duration::hours(24),
        )
        .await
        .unwrap();

    let engine = engine_with(pool.clone(), StubProvider::successful(200000));
    let (envelope, raw) = charge_success_envelope(&reference, 200000);

    let outcome = engine.process_event(&envelope, raw).await.unwrap();
    assert_eq!(outcome, SettlementOutcome::Settled);

    let rentals: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM rentals WHERE user_id = $1 AND content_id = $2")
            .bind(payment.user_id)
            .bind("c5")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(rentals, 1);
}

#[tokio::test]
#[ignore] // Requires database running
async fn wallet_topup_credits_balance_and_records_transaction() {
    let pool = setup_db().await;
    let reference = unique_ref("pay_topup");

    let payment = seed_payment(
        &pool,
        &reference,
        "wallet_topup",
        Decimal::from(1000),
        serde_json::json!({}),
    )
    .await;

    let engine = engine_with(pool.clone(), StubProvider::successful(100000));
    let (envelope, raw) = charge_success_envelope(&reference, 100000);

    let outcome = engine.process_event(&envelope, raw).await.unwrap();
    assert_eq!(outcome, SettlementOutcome::Settled);

    let wallets = WalletRepository::new(pool.clone());
    let wallet = wallets
        .find_by_user_id(payment.user_id)
        .await
        .unwrap()
        .expect("wallet created");
    assert_eq!(wallet.balance, Decimal::from(1000));

    let transactions = wallets.transactions_for_user(payment.user_id).await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].payment_id.as_deref(), Some(reference.as_str()));
    assert_eq!(transactions[0].transaction_type, "credit");
}

#[tokio::test]
#[ignore] // Requires database running
async fn processor_reported_failure_marks_payment_failed() {
    let pool = setup_db().await;
    let reference = unique_ref("pay_declined");

    seed_payment(
        &pool,
        &reference,
        "purchase",
        Decimal::from(300),
        serde_json::json!({"content_id": "c6", "content_type": "movie"}),
    )
    .await;

    let engine = engine_with(pool.clone(), StubProvider::successful(30000));
    let raw = serde_json::json!({
        "event": "charge.failed",
        "data": {
            "reference": reference,
            "gateway_response": "Insufficient funds",
        }
    });
    let envelope: WebhookEnvelope = serde_json::from_value(raw.clone()).unwrap();

    let outcome = engine.process_event(&envelope, raw).await.unwrap();
    assert_eq!(outcome, SettlementOutcome::MarkedFailed);

    let failed = PaymentRepository::new(pool)
        .find_by_id(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, "failed");
    assert_eq!(failed.error_message.as_deref(), Some("Insufficient funds"));
}

#[tokio::test]
#[ignore] // Requires database running
async fn requeue_refuses_payments_that_are_not_failed() {
    let pool = setup_db().await;
    let reference = unique_ref("pay_requeue_pending");

    seed_payment(
        &pool,
        &reference,
        "purchase",
        Decimal::from(300),
        serde_json::json!({"content_id": "c7", "content_type": "movie"}),
    )
    .await;

    let engine = engine_with(pool.clone(), StubProvider::successful(30000));
    assert!(engine.requeue_payment(&reference).await.unwrap().is_none());

    let payment = PaymentRepository::new(pool)
        .find_by_id(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, "pending");
}

#[tokio::test]
#[ignore] // Requires database running
async fn requeue_settles_despite_recorded_first_delivery() {
    let pool = setup_db().await;
    let reference = unique_ref("pay_requeue");

    let payment = seed_payment(
        &pool,
        &reference,
        "rental",
        Decimal::from(5000),
        serde_json::json!({"content_id": "c10", "content_type": "movie"}),
    )
    .await;

    // First delivery fails on amount mismatch and occupies the dedup table.
    let engine = engine_with(pool.clone(), StubProvider::successful(100000));
    let (envelope, raw) = charge_success_envelope(&reference, 100000);
    let first = engine.process_event(&envelope, raw.clone()).await.unwrap();
    assert_eq!(first, SettlementOutcome::MarkedFailed);

    // Redelivery cannot reach settlement; it is acknowledged as a duplicate.
    let fixed = engine_with(pool.clone(), StubProvider::successful(500000));
    let redelivered = fixed.process_event(&envelope, raw).await.unwrap();
    assert_eq!(redelivered, SettlementOutcome::DuplicateEvent);

    // The administrative requeue re-arms the payment and settles it directly.
    let outcome = fixed.requeue_payment(&reference).await.unwrap();
    assert_eq!(outcome, Some(SettlementOutcome::Settled));

    let settled = PaymentRepository::new(pool.clone())
        .find_by_id(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settled.status, "success");
    assert!(settled.error_message.is_none());

    let rental = RentalRepository::new(pool)
        .find_active(payment.user_id, "c10")
        .await
        .unwrap();
    assert!(rental.is_some());
}

#[tokio::test]
#[ignore] // Requires database running
async fn unverified_charge_leaves_payment_pending() {
    let pool = setup_db().await;
    let reference = unique_ref("pay_unverified");

    seed_payment(
        &pool,
        &reference,
        "purchase",
        Decimal::from(300),
        serde_json::json!({"content_id": "c8", "content_type": "movie"}),
    )
    .await;

    let provider = StubProvider {
        status: "abandoned".to_string(),
        amount_minor: 30000,
    };
    let engine = engine_with(pool.clone(), provider);
    let (envelope, raw) = charge_success_envelope(&reference, 30000);

    let outcome = engine.process_event(&envelope, raw).await.unwrap();
    assert_eq!(outcome, SettlementOutcome::Unverified);

    let payment = PaymentRepository::new(pool)
        .find_by_id(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, "pending");
}

//! Paystack payment provider implementation
//!
//! Handles server-to-server charge verification and webhook authentication
//! for payments collected through Paystack.

use crate::error::{AppError, AppErrorKind, AppResult, ExternalError, InfrastructureError};
use crate::payments::traits::PaymentProvider;
use crate::payments::types::VerifiedTransaction;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// Paystack provider configuration
#[derive(Debug, Clone)]
pub struct PaystackConfig {
    /// Paystack API secret key; also the webhook HMAC key
    pub secret_key: String,
    /// Paystack API base URL (defaults to https://api.paystack.co)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum number of retries for failed requests
    pub max_retries: u32,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            base_url: "https://api.paystack.co".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl PaystackConfig {
    /// Create config from environment variables.
    /// A missing secret key is a fatal configuration error, not something to
    /// discover per-request.
    pub fn from_env() -> Result<Self, AppError> {
        let secret_key = std::env::var("PAYSTACK_SECRET_KEY").map_err(|_| {
            AppError::new(AppErrorKind::Infrastructure(
                InfrastructureError::Configuration {
                    message: "PAYSTACK_SECRET_KEY environment variable is required".to_string(),
                },
            ))
        })?;

        let base_url = std::env::var("PAYSTACK_BASE_URL")
            .unwrap_or_else(|_| "https://api.paystack.co".to_string());

        let timeout_secs = std::env::var("PAYSTACK_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let max_retries = std::env::var("PAYSTACK_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);

        Ok(Self {
            secret_key,
            base_url,
            timeout_secs,
            max_retries,
        })
    }
}

/// Paystack payment provider
pub struct PaystackProvider {
    config: PaystackConfig,
    client: Client,
}

impl PaystackProvider {
    pub fn new(config: PaystackConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let config = PaystackConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Make an authenticated GET request to the Paystack API, retrying on
    /// rate limits and server errors with exponential backoff.
    async fn get_json<T>(&self, endpoint: &str) -> Result<T, AppError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.config.base_url, endpoint);

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            let request = self
                .client
                .get(&url)
                .header("Authorization", format!("Bearer {}", self.config.secret_key))
                .header("Content-Type", "application/json");

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let response_text = response.text().await.unwrap_or_default();

                    if status.is_success() {
                        return match serde_json::from_str::<PaystackResponse<T>>(&response_text) {
                            Ok(paystack_resp) if paystack_resp.status => Ok(paystack_resp.data),
                            Ok(paystack_resp) => {
                                error!("Paystack API error: {}", paystack_resp.message);
                                Err(AppError::new(AppErrorKind::External(
                                    ExternalError::PaymentProvider {
                                        provider: "Paystack".to_string(),
                                        message: paystack_resp.message,
                                        is_retryable: false,
                                    },
                                )))
                            }
                            Err(e) => {
                                error!("Failed to parse Paystack response: {}", e);
                                Err(AppError::new(AppErrorKind::External(
                                    ExternalError::PaymentProvider {
                                        provider: "Paystack".to_string(),
                                        message: format!("Invalid response format: {}", e),
                                        is_retryable: false,
                                    },
                                )))
                            }
                        };
                    } else if status == 429 {
                        if attempt < self.config.max_retries {
                            let backoff = 2_u64.pow(attempt);
                            warn!(
                                "Rate limited, retrying after {} seconds (attempt {})",
                                backoff,
                                attempt + 1
                            );
                            tokio::time::sleep(Duration::from_secs(backoff)).await;
                            continue;
                        }
                        return Err(AppError::new(AppErrorKind::External(
                            ExternalError::RateLimit {
                                service: "Paystack".to_string(),
                                retry_after: Some(60),
                            },
                        )));
                    } else if status.is_server_error() && attempt < self.config.max_retries {
                        let backoff = 2_u64.pow(attempt);
                        warn!(
                            "Server error {}, retrying after {} seconds (attempt {})",
                            status,
                            backoff,
                            attempt + 1
                        );
                        tokio::time::sleep(Duration::from_secs(backoff)).await;
                        continue;
                    } else {
                        let error_msg = format!("HTTP {}: {}", status, response_text);
                        error!("Paystack API error: {}", error_msg);
                        return Err(AppError::new(AppErrorKind::External(
                            ExternalError::PaymentProvider {
                                provider: "Paystack".to_string(),
                                message: error_msg,
                                is_retryable: status.is_server_error(),
                            },
                        )));
                    }
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        let backoff = 2_u64.pow(attempt);
                        warn!(
                            "Request error, retrying after {} seconds (attempt {}): {}",
                            backoff,
                            attempt + 1,
                            last_error.as_ref().unwrap()
                        );
                        tokio::time::sleep(Duration::from_secs(backoff)).await;
                        continue;
                    }
                }
            }
        }

        Err(AppError::new(AppErrorKind::External(
            ExternalError::PaymentProvider {
                provider: "Paystack".to_string(),
                message: format!(
                    "Request failed after {} retries: {}",
                    self.config.max_retries,
                    last_error
                        .as_ref()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "Unknown error".to_string())
                ),
                is_retryable: true,
            },
        )))
    }
}

#[async_trait]
impl PaymentProvider for PaystackProvider {
    fn name(&self) -> &'static str {
        "paystack"
    }

    async fn verify_transaction(&self, reference: &str) -> AppResult<VerifiedTransaction> {
        info!("Verifying Paystack transaction: reference={}", reference);

        let response: PaystackVerifyResponse = self
            .get_json(&format!("/transaction/verify/{}", reference))
            .await?;

        info!(
            "Paystack transaction verified: reference={}, status={}",
            reference, response.status
        );

        Ok(VerifiedTransaction {
            status: response.status,
            amount_minor: response.amount,
            currency: response.currency,
            gateway_response: response.gateway_response,
            paid_at: response.paid_at,
            channel: response.channel,
        })
    }

    fn validate_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        use hmac::{Hmac, Mac};
        use sha2::Sha512;

        type HmacSha512 = Hmac<Sha512>;

        let mut mac = HmacSha512::new_from_slice(self.config.secret_key.as_bytes())
            .expect("HMAC can take key of any size");

        mac.update(payload);
        let computed_signature = hex::encode(mac.finalize().into_bytes());

        // Paystack sends the signature as a hex string
        let provided_signature = signature.trim();

        // Constant-time comparison to prevent timing attacks
        if computed_signature.len() != provided_signature.len() {
            return false;
        }

        computed_signature
            .as_bytes()
            .iter()
            .zip(provided_signature.as_bytes().iter())
            .fold(0, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

// Paystack API response wrapper
#[derive(Debug, Deserialize)]
struct PaystackResponse<T> {
    status: bool,
    message: String,
    data: T,
}

// Verify transaction response
#[derive(Debug, Deserialize)]
struct PaystackVerifyResponse {
    amount: i64,
    currency: String,
    status: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    paid_at: Option<String>,
    #[serde(default)]
    gateway_response: Option<String>,
}

//! Payment gateway adapter.
//!
//! The core only needs two calls: create a checkout and verify it once the
//! gateway redirects back. Everything provider-specific stays behind the
//! [`PaymentGateway`] trait, so the callback flow is testable against the
//! sandbox implementation.

use async_trait::async_trait;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Zarinpal verify codes meaning the payment went through. 101 is returned
/// for a transaction that was already verified.
const VERIFY_OK_CODES: &[i64] = &[100, 101];

#[derive(Error, Debug)]
pub enum GatewayError {
    /// The gateway processed the request and said no
    #[error("gateway rejected the request with code {0}")]
    Rejected(i64),
    /// The gateway could not be reached or answered garbage
    #[error("gateway request failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Amount in whole currency units
    pub amount: i64,
    pub description: String,
    /// Where the gateway sends the customer after payment
    pub callback_url: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    /// Gateway reference token identifying this checkout
    pub authority: String,
    /// Where to send the customer to pay
    pub redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub ref_id: String,
    pub card_mask: Option<String>,
    pub fee: Option<i64>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Short name recorded on payment rows.
    fn name(&self) -> &'static str;

    async fn create_checkout(&self, req: &CheckoutRequest)
    -> Result<CheckoutSession, GatewayError>;

    async fn verify_checkout(
        &self,
        authority: &str,
        amount: i64,
    ) -> Result<VerifiedPayment, GatewayError>;
}

/// Zarinpal REST gateway. Amounts are charged in rials while the catalog
/// prices are in tomans, hence the tenfold conversion.
pub struct ZarinpalGateway {
    client: reqwest::Client,
    merchant_id: String,
    sandbox: bool,
}

impl std::fmt::Debug for ZarinpalGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZarinpalGateway")
            .field("sandbox", &self.sandbox)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ZarinpalPaymentRequest<'a> {
    merchant_id: &'a str,
    amount: i64,
    callback_url: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct ZarinpalVerifyRequest<'a> {
    merchant_id: &'a str,
    amount: i64,
    authority: &'a str,
}

#[derive(Deserialize)]
struct ZarinpalEnvelope<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct ZarinpalPaymentData {
    code: i64,
    authority: Option<String>,
}

#[derive(Deserialize)]
struct ZarinpalVerifyData {
    code: i64,
    ref_id: Option<i64>,
    card_pan: Option<String>,
    fee: Option<i64>,
}

impl ZarinpalGateway {
    pub fn new(merchant_id: String, sandbox: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            merchant_id,
            sandbox,
        }
    }

    fn api_base(&self) -> &'static str {
        if self.sandbox {
            "https://sandbox.zarinpal.com"
        } else {
            "https://payment.zarinpal.com"
        }
    }

    fn rials(amount: i64) -> i64 {
        amount * 10
    }
}

#[async_trait]
impl PaymentGateway for ZarinpalGateway {
    fn name(&self) -> &'static str {
        "zarinpal"
    }

    async fn create_checkout(
        &self,
        req: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let url = format!("{}/pg/v4/payment/request.json", self.api_base());
        let body = ZarinpalPaymentRequest {
            merchant_id: &self.merchant_id,
            amount: Self::rials(req.amount),
            callback_url: &req.callback_url,
            description: &req.description,
        };

        let response: ZarinpalEnvelope<ZarinpalPaymentData> = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let data = response
            .data
            .ok_or_else(|| GatewayError::Transport("missing data in response".to_string()))?;
        if data.code != 100 {
            return Err(GatewayError::Rejected(data.code));
        }
        let authority = data
            .authority
            .ok_or_else(|| GatewayError::Transport("missing authority in response".to_string()))?;

        let redirect_url = format!("{}/pg/StartPay/{authority}", self.api_base());
        Ok(CheckoutSession {
            authority,
            redirect_url,
        })
    }

    async fn verify_checkout(
        &self,
        authority: &str,
        amount: i64,
    ) -> Result<VerifiedPayment, GatewayError> {
        let url = format!("{}/pg/v4/payment/verify.json", self.api_base());
        let body = ZarinpalVerifyRequest {
            merchant_id: &self.merchant_id,
            amount: Self::rials(amount),
            authority,
        };

        let response: ZarinpalEnvelope<ZarinpalVerifyData> = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let data = response
            .data
            .ok_or_else(|| GatewayError::Transport("missing data in response".to_string()))?;
        if !VERIFY_OK_CODES.contains(&data.code) {
            return Err(GatewayError::Rejected(data.code));
        }
        let ref_id = data
            .ref_id
            .ok_or_else(|| GatewayError::Transport("missing ref_id in response".to_string()))?;

        Ok(VerifiedPayment {
            ref_id: ref_id.to_string(),
            card_mask: data.card_pan,
            fee: data.fee,
        })
    }
}

/// Local stand-in used when no merchant id is configured and in tests.
/// Issues random authorities and verifies everything, unless built with
/// [`SandboxGateway::rejecting`].
#[derive(Debug)]
pub struct SandboxGateway {
    reject_verification: bool,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self {
            reject_verification: false,
        }
    }

    /// A sandbox that fails every verification, for exercising the failure
    /// path.
    pub fn rejecting() -> Self {
        Self {
            reject_verification: true,
        }
    }

    fn random_token(len: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }
}

impl Default for SandboxGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    fn name(&self) -> &'static str {
        "sandbox"
    }

    async fn create_checkout(
        &self,
        _req: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let authority = format!("S{}", Self::random_token(35));
        let redirect_url = format!("https://sandbox.invalid/pg/StartPay/{authority}");
        Ok(CheckoutSession {
            authority,
            redirect_url,
        })
    }

    async fn verify_checkout(
        &self,
        _authority: &str,
        _amount: i64,
    ) -> Result<VerifiedPayment, GatewayError> {
        if self.reject_verification {
            return Err(GatewayError::Rejected(-53));
        }
        Ok(VerifiedPayment {
            ref_id: Self::random_token(12),
            card_mask: Some("502229******1234".to_string()),
            fee: None,
        })
    }
}

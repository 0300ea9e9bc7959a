//! Payment gateway trait, HTTP client and in-memory implementation.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use cart::Money;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;
use crate::order_fulfillment::STEP_AUTHORIZE_PAYMENT;

/// Outcome of an authorization request that the gateway answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentDecision {
    Authorized {
        transaction_id: String,
        message: Option<String>,
    },
    /// A valid business outcome, not an error.
    Declined { message: Option<String> },
}

impl PaymentDecision {
    pub fn is_authorized(&self) -> bool {
        matches!(self, PaymentDecision::Authorized { .. })
    }

    /// Wire label of the decision (`"Authorized"` / `"Declined"`).
    pub fn status(&self) -> &'static str {
        match self {
            PaymentDecision::Authorized { .. } => "Authorized",
            PaymentDecision::Declined { .. } => "Declined",
        }
    }
}

/// Trait for payment authorization.
///
/// One request/response exchange per call, no retry. Implementations return
/// `InvalidCredential` when the gateway rejects the credential format and
/// `Upstream` for anything else that is not a decision.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Asks the gateway to authorize `amount` against `credential`.
    async fn authorize(&self, credential: &str, amount: Money)
    -> Result<PaymentDecision, SagaError>;
}

#[derive(Serialize)]
struct AuthorizeRequest<'a> {
    credit_card_number: &'a str,
    amount: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthorizeResponse {
    status: Option<String>,
    transaction_id: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

/// Payment gateway reached over HTTP (`POST {base}/authorize`).
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    authorize_url: String,
}

impl HttpPaymentGateway {
    /// Creates a client for the gateway at `base_url`.
    ///
    /// `timeout` bounds the whole exchange; a gateway that hangs past it is
    /// reported as an upstream failure.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SagaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SagaError::upstream(STEP_AUTHORIZE_PAYMENT, e))?;

        Ok(Self {
            client,
            authorize_url: format!("{}/authorize", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self, credential), fields(url = %self.authorize_url))]
    async fn authorize(
        &self,
        credential: &str,
        amount: Money,
    ) -> Result<PaymentDecision, SagaError> {
        let response = self
            .client
            .post(&self.authorize_url)
            .json(&AuthorizeRequest {
                credit_card_number: credential,
                amount: amount.as_decimal(),
            })
            .send()
            .await
            .map_err(|e| SagaError::upstream(STEP_AUTHORIZE_PAYMENT, e))?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let body: AuthorizeResponse = response
                    .json()
                    .await
                    .map_err(|e| SagaError::upstream(STEP_AUTHORIZE_PAYMENT, e))?;
                let transaction_id = body.transaction_id.ok_or_else(|| {
                    SagaError::upstream(
                        STEP_AUTHORIZE_PAYMENT,
                        "authorized response carried no transaction id",
                    )
                })?;
                Ok(PaymentDecision::Authorized {
                    transaction_id,
                    message: body.message,
                })
            }
            StatusCode::PAYMENT_REQUIRED => {
                let body: AuthorizeResponse = response.json().await.unwrap_or_default();
                tracing::debug!(status = ?body.status, "gateway declined payment");
                Ok(PaymentDecision::Declined {
                    message: body.message,
                })
            }
            StatusCode::BAD_REQUEST => {
                let body: AuthorizeResponse = response.json().await.unwrap_or_default();
                let reason = body
                    .message
                    .or(body.error)
                    .unwrap_or_else(|| "invalid credit card format".to_string());
                Err(SagaError::InvalidCredential(reason))
            }
            other => Err(SagaError::upstream(
                STEP_AUTHORIZE_PAYMENT,
                format!("payment gateway returned status {}", other.as_u16()),
            )),
        }
    }
}

/// Scripted behavior of [`InMemoryPaymentGateway`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatewayOutcome {
    /// Authorize well-formed credentials; reject malformed ones like the real
    /// gateway does.
    #[default]
    Authorize,
    Decline,
    Unavailable,
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    outcome: GatewayOutcome,
    queued: VecDeque<GatewayOutcome>,
    calls: Vec<(String, Money)>,
    next_id: u32,
    delay: Duration,
}

/// In-memory payment gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a gateway that authorizes every well-formed credential.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the outcome for every call not covered by [`push_outcome`](Self::push_outcome).
    pub fn set_outcome(&self, outcome: GatewayOutcome) {
        self.write().outcome = outcome;
    }

    /// Queues a one-off outcome for the next call.
    pub fn push_outcome(&self, outcome: GatewayOutcome) {
        self.write().queued.push_back(outcome);
    }

    /// Makes each call take at least `delay`, to widen race windows in tests.
    pub fn set_delay(&self, delay: Duration) {
        self.write().delay = delay;
    }

    /// Number of authorization requests received.
    pub fn call_count(&self) -> usize {
        self.read().calls.len()
    }

    /// Every (credential, amount) pair received, in order.
    pub fn calls(&self) -> Vec<(String, Money)> {
        self.read().calls.clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryPaymentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryPaymentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Checks the `dddd-dddd-dddd-dddd` card number format.
fn is_well_formed_card_number(credential: &str) -> bool {
    let groups: Vec<&str> = credential.split('-').collect();
    groups.len() == 4
        && groups
            .iter()
            .all(|group| group.len() == 4 && group.bytes().all(|b| b.is_ascii_digit()))
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn authorize(
        &self,
        credential: &str,
        amount: Money,
    ) -> Result<PaymentDecision, SagaError> {
        let (outcome, delay, transaction_seq) = {
            let mut state = self.write();
            state.calls.push((credential.to_string(), amount));
            let outcome = state.queued.pop_front().unwrap_or(state.outcome);
            state.next_id += 1;
            (outcome, state.delay, state.next_id)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            GatewayOutcome::Unavailable => Err(SagaError::upstream(
                STEP_AUTHORIZE_PAYMENT,
                "payment gateway unavailable",
            )),
            _ if !is_well_formed_card_number(credential) => Err(SagaError::InvalidCredential(
                "Format must be XXXX-XXXX-XXXX-XXXX".to_string(),
            )),
            GatewayOutcome::Decline => Ok(PaymentDecision::Declined {
                message: Some("Card declined by issuer".to_string()),
            }),
            GatewayOutcome::Authorize => Ok(PaymentDecision::Authorized {
                transaction_id: format!("TXN-{transaction_seq:04}"),
                message: Some("Payment authorized successfully".to_string()),
            }),
        }
    }
}

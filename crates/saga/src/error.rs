//! Saga error types.

use cart::CartError;
use thiserror::Error;

/// Errors that can occur during cart coordination and checkout.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Cart-level failure: not found, invalid quantity, empty cart.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The payment gateway declined the charge. The cart is left intact.
    #[error("Payment declined: {message}")]
    Declined { message: String },

    /// The payment gateway rejected the credential format. Nothing was charged.
    #[error("Invalid payment credential: {0}")]
    InvalidCredential(String),

    /// A collaborator (payment gateway or broker) failed or was unreachable.
    #[error("Saga step '{step}' failed: {reason}")]
    Upstream { step: &'static str, reason: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaError {
    /// Wraps a collaborator failure for the given step, hiding wire detail
    /// behind its display form.
    pub fn upstream(step: &'static str, err: impl std::fmt::Display) -> Self {
        SagaError::Upstream {
            step,
            reason: err.to_string(),
        }
    }

    /// Short label used as the `outcome` metric dimension.
    pub fn outcome(&self) -> &'static str {
        match self {
            SagaError::Cart(CartError::NotFound(_)) => "not_found",
            SagaError::Cart(CartError::EmptyCart) => "empty_cart",
            SagaError::Cart(_) => "invalid",
            SagaError::Declined { .. } => "declined",
            SagaError::InvalidCredential(_) => "invalid_credential",
            SagaError::Upstream { .. } | SagaError::Serialization(_) => "upstream_failure",
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

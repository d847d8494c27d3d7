use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Raised when a recurrence cannot produce a next billing time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidRecurrenceError {
    #[error("recurrence period must be positive, got {0}")]
    NonPositivePeriod(i64),
    #[error("unknown recurrence unit code {0}")]
    UnknownUnit(i64),
    #[error("next billing time is outside the supported calendar range")]
    OutOfRange,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("subscription {0} was modified by another writer")]
    Conflict(Uuid),
    #[error("subscription {0} not found")]
    NotFound(Uuid),
    #[error("invalid stored recurrence: {0}")]
    Recurrence(#[from] InvalidRecurrenceError),
    #[error("{0}")]
    Message(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("payment declined: {0}")]
    Declined(String),
    #[error("payment gateway timed out after {0:?}")]
    Timeout(Duration),
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("notification endpoint rejected event with status {0}")]
    Rejected(u16),
    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("unknown currency locale `{0}`")]
    UnknownLocale(String),
    #[error("`{0}` is not a decimal amount")]
    InvalidAmount(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value `{value}`: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Currency(#[from] CurrencyError),
}

/// Failure of a single subscription transition inside a batch pass.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error(transparent)]
    InvalidRecurrence(#[from] InvalidRecurrenceError),
    #[error("payment declined for subscription {subscription}: {reason}")]
    PaymentDeclined { subscription: Uuid, reason: String },
    #[error("payment gateway timed out for subscription {0}")]
    GatewayTimeout(Uuid),
    #[error("payment gateway error for subscription {subscription}: {reason}")]
    GatewayUnavailable { subscription: Uuid, reason: String },
    #[error("subscription {0} kept changing underneath the transition")]
    PersistenceConflict(Uuid),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl BillingError {
    pub fn from_gateway(subscription: Uuid, err: GatewayError) -> Self {
        match err {
            GatewayError::Declined(reason) => BillingError::PaymentDeclined {
                subscription,
                reason,
            },
            GatewayError::Timeout(_) => BillingError::GatewayTimeout(subscription),
            GatewayError::Unavailable(reason) => BillingError::GatewayUnavailable {
                subscription,
                reason,
            },
        }
    }

    /// Charges that did not go through leave the subscription due for the next pass.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BillingError::PaymentDeclined { .. }
                | BillingError::GatewayTimeout(_)
                | BillingError::GatewayUnavailable { .. }
                | BillingError::PersistenceConflict(_)
        )
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
pub type RepositoryResult<T> = Result<T, RepositoryError>;

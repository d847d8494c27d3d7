use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::GatewayError;

/// Result of a charge attempt the gateway was able to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeOutcome {
    pub approved: bool,
    /// When the provider settled the charge; the batch time is used when absent.
    pub settled_at: Option<DateTime<Utc>>,
    pub reference: Option<String>,
}

impl ChargeOutcome {
    pub fn approved(settled_at: Option<DateTime<Utc>>) -> Self {
        Self {
            approved: true,
            settled_at,
            reference: None,
        }
    }

    pub fn declined(reference: impl Into<String>) -> Self {
        Self {
            approved: false,
            settled_at: None,
            reference: Some(reference.into()),
        }
    }
}

/// key: billing-adapter -> payment provider integration
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(
        &self,
        subscriber_id: Uuid,
        amount: Decimal,
        currency: &str,
    ) -> Result<ChargeOutcome, GatewayError>;
}

/// Approves every charge without contacting a provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApprovingGateway;

#[async_trait]
impl PaymentGateway for ApprovingGateway {
    async fn charge(
        &self,
        subscriber_id: Uuid,
        amount: Decimal,
        currency: &str,
    ) -> Result<ChargeOutcome, GatewayError> {
        tracing::debug!(
            subscriber = %subscriber_id,
            %amount,
            currency,
            "approving charge without provider"
        );
        Ok(ChargeOutcome::approved(None))
    }
}

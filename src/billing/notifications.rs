use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::info;

use crate::error::NotificationError;

use super::models::UserSubscription;

pub const SIGNATURE_HEADER: &str = "x-billing-signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Expired,
    New,
    PaymentError,
    PaymentSuccess,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Expired => "expired",
            LifecycleEvent::New => "new",
            LifecycleEvent::PaymentError => "payment_error",
            LifecycleEvent::PaymentSuccess => "payment_success",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// key: billing-notifications -> lifecycle hooks
///
/// Only `notify` is required; the named hooks forward to it.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn notify(
        &self,
        event: LifecycleEvent,
        subscription: &UserSubscription,
    ) -> Result<(), NotificationError>;

    async fn notify_expired(&self, subscription: &UserSubscription) -> Result<(), NotificationError> {
        self.notify(LifecycleEvent::Expired, subscription).await
    }

    async fn notify_new(&self, subscription: &UserSubscription) -> Result<(), NotificationError> {
        self.notify(LifecycleEvent::New, subscription).await
    }

    async fn notify_payment_error(
        &self,
        subscription: &UserSubscription,
    ) -> Result<(), NotificationError> {
        self.notify(LifecycleEvent::PaymentError, subscription).await
    }

    async fn notify_payment_success(
        &self,
        subscription: &UserSubscription,
    ) -> Result<(), NotificationError> {
        self.notify(LifecycleEvent::PaymentSuccess, subscription).await
    }
}

/// Writes each event to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationService for LogNotifier {
    async fn notify(
        &self,
        event: LifecycleEvent,
        subscription: &UserSubscription,
    ) -> Result<(), NotificationError> {
        info!(
            event = event.as_str(),
            subscription = %subscription.id,
            subscriber = %subscription.subscriber_id,
            active = subscription.active,
            cancelled = subscription.cancelled,
            "subscription lifecycle event"
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub event: LifecycleEvent,
    pub subscription: &'a UserSubscription,
}

/// key: billing-webhook -> signed lifecycle callbacks
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    secret: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, secret: Option<String>) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            secret,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// `sha256=<hex>` HMAC of `body` under `secret`.
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String, NotificationError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|err| NotificationError::Message(format!("invalid webhook secret: {err}")))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[async_trait]
impl NotificationService for WebhookNotifier {
    async fn notify(
        &self,
        event: LifecycleEvent,
        subscription: &UserSubscription,
    ) -> Result<(), NotificationError> {
        let body = serde_json::to_vec(&WebhookPayload {
            event,
            subscription,
        })?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body)?);
        }

        let response = request.body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_known_vector() {
        // RFC 4231 test case 2
        let signature = sign_payload("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn event_names_are_snake_case() {
        assert_eq!(
            serde_json::to_value(LifecycleEvent::PaymentSuccess).unwrap(),
            serde_json::json!("payment_success")
        );
        assert_eq!(LifecycleEvent::PaymentError.to_string(), "payment_error");
    }
}

use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use serde_json::json;
use subscription_billing::billing::notifications::{sign_payload, WebhookPayload};
use subscription_billing::billing::{
    LifecycleEvent, NotificationService, UserSubscription, WebhookNotifier, SIGNATURE_HEADER,
};
use subscription_billing::error::NotificationError;
use uuid::Uuid;

fn subscription() -> UserSubscription {
    let start = Utc.with_ymd_and_hms(2018, 1, 1, 1, 1, 1).unwrap();
    UserSubscription::pending(Uuid::new_v4(), Uuid::new_v4(), start)
}

// key: billing-webhook-tests -> signed lifecycle callbacks
#[tokio::test]
async fn webhook_posts_signed_event() {
    let server = MockServer::start_async().await;
    let subscription = subscription();

    let body = serde_json::to_vec(&WebhookPayload {
        event: LifecycleEvent::New,
        subscription: &subscription,
    })
    .unwrap();
    let signature = sign_payload("top-secret", &body).unwrap();

    let hook = server.mock(|when, then| {
        when.method(POST)
            .path("/hooks/billing")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature.as_str())
            .json_body(json!({
                "event": "new",
                "subscription": serde_json::to_value(&subscription).unwrap(),
            }));
        then.status(204);
    });

    let notifier =
        WebhookNotifier::new(server.url("/hooks/billing"), Some("top-secret".to_string())).unwrap();
    notifier.notify_new(&subscription).await.unwrap();

    hook.assert_async().await;
}

#[tokio::test]
async fn webhook_without_secret_is_unsigned() {
    let server = MockServer::start_async().await;
    let subscription = subscription();

    let hook = server.mock(|when, then| {
        when.method(POST)
            .path("/hooks/billing")
            .json_body_partial(r#"{"event": "payment_success"}"#);
        then.status(200);
    });

    let notifier = WebhookNotifier::new(server.url("/hooks/billing"), None).unwrap();
    notifier.notify_payment_success(&subscription).await.unwrap();

    hook.assert_async().await;
}

#[tokio::test]
async fn webhook_reports_rejected_status() {
    let server = MockServer::start_async().await;
    let subscription = subscription();

    let hook = server.mock(|when, then| {
        when.method(POST).path("/hooks/billing");
        then.status(503);
    });

    let notifier = WebhookNotifier::new(server.url("/hooks/billing"), None).unwrap();
    let err = notifier.notify_expired(&subscription).await.unwrap_err();

    assert!(matches!(err, NotificationError::Rejected(503)));
    hook.assert_async().await;
}

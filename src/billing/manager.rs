use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::time;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{BillingError, BillingResult, GatewayError, RepositoryError};

use super::adapters::PaymentGateway;
use super::models::{
    BatchPhase, BatchResult, DueSubscription, SubscriptionTransaction, UserSubscription,
};
use super::notifications::{LifecycleEvent, NotificationService};
use super::repository::{MembershipChange, SubscriptionRepository};

/// Engine knobs resolved from configuration.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// ISO code passed to the payment gateway.
    pub currency_code: String,
    pub gateway_timeout: Duration,
    /// Extra commit attempts after a concurrent update.
    pub conflict_retries: u32,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            currency_code: "USD".to_string(),
            gateway_timeout: Duration::from_secs(30),
            conflict_retries: 1,
        }
    }
}

enum Transition {
    Skipped,
    Expired,
    Charged,
}

/// Everything one transition writes in a single `commit_transition`.
#[derive(Debug)]
struct TransitionWrite {
    updated: UserSubscription,
    transaction: Option<SubscriptionTransaction>,
    membership: Option<MembershipChange>,
}

/// key: billing-manager -> expire, activate and renew subscriptions
pub struct BillingManager {
    repository: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationService>,
    settings: ManagerSettings,
}

impl BillingManager {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationService>,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            repository,
            gateway,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// One batch pass at `now`: expirations, then first charges, then renewals.
    ///
    /// Candidate lists are read before any transition runs, so a subscription
    /// activated in this pass is not renewed in the same pass. Only a failed
    /// candidate query aborts the pass; per-subscription failures are collected
    /// in the result.
    pub async fn run_batch(&self, now: DateTime<Utc>) -> Result<BatchResult, RepositoryError> {
        let expiring = self.repository.find_expiring(now).await?;
        let newly_due = self.repository.find_newly_due(now).await?;
        let renewals = self.repository.find_renewals_due(now).await?;

        debug!(
            %now,
            expiring = expiring.len(),
            newly_due = newly_due.len(),
            renewals = renewals.len(),
            "starting billing batch pass"
        );

        let mut result = BatchResult::default();
        let phases = [
            (BatchPhase::Expiration, expiring),
            (BatchPhase::Activation, newly_due),
            (BatchPhase::Renewal, renewals),
        ];
        for (phase, candidates) in phases {
            for candidate in candidates {
                self.run_transition(phase, candidate, now, &mut result)
                    .await;
            }
        }

        Ok(result)
    }

    async fn run_transition(
        &self,
        phase: BatchPhase,
        candidate: DueSubscription,
        now: DateTime<Utc>,
        result: &mut BatchResult,
    ) {
        let subscription_id = candidate.subscription.id;
        result.processed += 1;

        match self.transition(phase, candidate, now).await {
            Ok(Transition::Skipped) => result.skipped += 1,
            Ok(Transition::Expired) => result.expired += 1,
            Ok(Transition::Charged) => result.charged += 1,
            Err(err) => {
                warn!(
                    ?err,
                    subscription = %subscription_id,
                    phase = phase.as_str(),
                    retryable = err.is_retryable(),
                    "billing transition failed"
                );
                result.record_failure(subscription_id, phase, err);
            }
        }
    }

    async fn transition(
        &self,
        phase: BatchPhase,
        candidate: DueSubscription,
        now: DateTime<Utc>,
    ) -> BillingResult<Transition> {
        let subscription_id = candidate.subscription.id;
        let current = match self.repository.reload(subscription_id).await? {
            Some(current) if phase.is_due(&current.subscription, now) => current,
            _ => {
                debug!(
                    subscription = %subscription_id,
                    phase = phase.as_str(),
                    "subscription no longer due"
                );
                return Ok(Transition::Skipped);
            }
        };

        match phase {
            BatchPhase::Expiration => self.expire(current, now).await,
            BatchPhase::Activation | BatchPhase::Renewal => self.charge(phase, current, now).await,
        }
    }

    async fn expire(&self, current: DueSubscription, now: DateTime<Utc>) -> BillingResult<Transition> {
        let committed = self
            .commit_with_retry(BatchPhase::Expiration, current, now, |due| {
                let mut updated = due.subscription.clone();
                updated.active = false;
                updated.cancelled = true;
                let membership = due.group_id.map(|group_id| MembershipChange::RevokeIfLast {
                    subscriber_id: updated.subscriber_id,
                    group_id,
                });
                Ok(TransitionWrite {
                    updated,
                    transaction: None,
                    membership,
                })
            })
            .await?;

        let Some(updated) = committed else {
            return Ok(Transition::Skipped);
        };

        info!(
            subscription = %updated.id,
            subscriber = %updated.subscriber_id,
            "subscription expired"
        );

        self.announce(LifecycleEvent::Expired, &updated).await;
        Ok(Transition::Expired)
    }

    async fn charge(
        &self,
        phase: BatchPhase,
        current: DueSubscription,
        now: DateTime<Utc>,
    ) -> BillingResult<Transition> {
        let subscription_id = current.subscription.id;
        // recorded as charged even if a conflict reload sees a newer cost
        let amount = current.cost.cost;

        // Unusable recurrences are rejected before any money moves.
        charged_transition(phase, &current, amount, now)?;

        let settled_at = match self.capture(current.subscription.subscriber_id, amount).await {
            Ok(settled_at) => settled_at.unwrap_or(now),
            Err(err) => {
                self.announce(LifecycleEvent::PaymentError, &current.subscription)
                    .await;
                return Err(BillingError::from_gateway(subscription_id, err));
            }
        };

        let committed = self
            .commit_with_retry(phase, current, now, |due| {
                charged_transition(phase, due, amount, settled_at)
            })
            .await?;

        let Some(updated) = committed else {
            error!(
                subscription = %subscription_id,
                phase = phase.as_str(),
                "charge captured but subscription changed before it could be recorded"
            );
            return Err(BillingError::PersistenceConflict(subscription_id));
        };

        info!(
            subscription = %updated.id,
            subscriber = %updated.subscriber_id,
            amount = %amount,
            phase = phase.as_str(),
            next = ?updated.date_billing_next,
            "subscription charged"
        );

        let event = match phase {
            BatchPhase::Activation => LifecycleEvent::New,
            _ => LifecycleEvent::PaymentSuccess,
        };
        self.announce(event, &updated).await;

        Ok(Transition::Charged)
    }

    /// Returns the provider's settlement time, if it reported one.
    async fn capture(
        &self,
        subscriber_id: Uuid,
        amount: Decimal,
    ) -> Result<Option<DateTime<Utc>>, GatewayError> {
        let timeout = self.settings.gateway_timeout;
        let attempt = time::timeout(
            timeout,
            self.gateway
                .charge(subscriber_id, amount, &self.settings.currency_code),
        )
        .await;

        match attempt {
            Err(_) => Err(GatewayError::Timeout(timeout)),
            Ok(Err(err)) => Err(err),
            Ok(Ok(outcome)) if outcome.approved => Ok(outcome.settled_at),
            Ok(Ok(outcome)) => Err(GatewayError::Declined(
                outcome
                    .reference
                    .unwrap_or_else(|| "declined by gateway".to_string()),
            )),
        }
    }

    /// Commits the update built from `current`, reloading and rebuilding after
    /// a conflict. `Ok(None)` means the subscription stopped being due.
    async fn commit_with_retry<F>(
        &self,
        phase: BatchPhase,
        mut current: DueSubscription,
        now: DateTime<Utc>,
        build: F,
    ) -> BillingResult<Option<UserSubscription>>
    where
        F: Fn(&DueSubscription) -> BillingResult<TransitionWrite> + Send + Sync,
    {
        let mut retries_left = self.settings.conflict_retries;
        loop {
            let write = build(&current)?;
            let committed = self
                .repository
                .commit_transition(
                    &current.subscription,
                    &write.updated,
                    write.transaction.as_ref(),
                    write.membership,
                )
                .await;

            match committed {
                Ok(()) => return Ok(Some(write.updated)),
                Err(RepositoryError::Conflict(id)) if retries_left > 0 => {
                    retries_left -= 1;
                    debug!(
                        subscription = %id,
                        phase = phase.as_str(),
                        "concurrent update, reloading subscription"
                    );
                    match self.repository.reload(id).await? {
                        Some(reloaded) if phase.is_due(&reloaded.subscription, now) => {
                            current = reloaded;
                        }
                        _ => return Ok(None),
                    }
                }
                Err(RepositoryError::Conflict(id)) => {
                    return Err(BillingError::PersistenceConflict(id))
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn announce(&self, event: LifecycleEvent, subscription: &UserSubscription) {
        let sent = match event {
            LifecycleEvent::Expired => self.notifier.notify_expired(subscription).await,
            LifecycleEvent::New => self.notifier.notify_new(subscription).await,
            LifecycleEvent::PaymentError => self.notifier.notify_payment_error(subscription).await,
            LifecycleEvent::PaymentSuccess => {
                self.notifier.notify_payment_success(subscription).await
            }
        };

        if let Err(err) = sent {
            warn!(
                ?err,
                event = event.as_str(),
                subscription = %subscription.id,
                "lifecycle notification failed"
            );
        }
    }

    /// key: billing-cancel -> stop future charges
    ///
    /// A pending subscription is closed immediately. An active one keeps its
    /// paid-up access: the end date moves to the next billing date and the
    /// expiration pass retires it from there.
    pub async fn cancel(
        &self,
        subscription_id: Uuid,
        now: DateTime<Utc>,
    ) -> BillingResult<UserSubscription> {
        let current = self
            .repository
            .reload(subscription_id)
            .await?
            .ok_or(RepositoryError::NotFound(subscription_id))?;
        let subscription = current.subscription;

        if subscription.cancelled
            || (subscription.active
                && subscription.date_billing_next.is_none()
                && subscription.date_billing_end.is_some())
        {
            return Ok(subscription);
        }

        let mut updated = subscription.clone();
        if subscription.active {
            updated.date_billing_end = Some(subscription.date_billing_next.unwrap_or(now));
        } else {
            updated.cancelled = true;
            updated.date_billing_end = Some(now);
        }
        updated.date_billing_next = None;

        match self
            .repository
            .commit_transition(&subscription, &updated, None, None)
            .await
        {
            Ok(()) => {}
            Err(RepositoryError::Conflict(id)) => return Err(BillingError::PersistenceConflict(id)),
            Err(err) => return Err(err.into()),
        }

        info!(
            subscription = %updated.id,
            subscriber = %updated.subscriber_id,
            ends = ?updated.date_billing_end,
            "subscription cancelled"
        );
        Ok(updated)
    }
}

/// State after `amount` was charged and settled at `settled_at`.
fn charged_transition(
    phase: BatchPhase,
    due: &DueSubscription,
    amount: Decimal,
    settled_at: DateTime<Utc>,
) -> BillingResult<TransitionWrite> {
    let subscription = &due.subscription;
    let anchor = match phase {
        BatchPhase::Renewal => subscription
            .date_billing_next
            .unwrap_or(subscription.date_billing_start),
        _ => subscription.date_billing_start,
    };

    let mut updated = subscription.clone();
    updated.active = true;
    updated.date_billing_last = Some(settled_at);
    updated.date_billing_next = due.cost.next_billing_datetime(anchor)?;

    let mut transaction = SubscriptionTransaction::for_charge(subscription, &due.cost, settled_at);
    transaction.amount = amount;

    // renewals leave membership alone; a manual removal stays removed
    let membership = match phase {
        BatchPhase::Activation => due.group_id.map(|group_id| MembershipChange::Grant {
            subscriber_id: subscription.subscriber_id,
            group_id,
        }),
        _ => None,
    };

    Ok(TransitionWrite {
        updated,
        transaction: Some(transaction),
        membership,
    })
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::RepositoryResult;

use super::models::{DueSubscription, SubscriptionTransaction, UserSubscription};

/// key: billing-repository -> named queries + guarded writes
///
/// Implementations must make `commit_transition` atomic: the subscription
/// update, the transaction row and the membership change all land, or none do.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Active, not cancelled, `date_billing_end <= now`.
    async fn find_expiring(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<DueSubscription>>;

    /// Inactive, not cancelled, `date_billing_start <= now`.
    async fn find_newly_due(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<DueSubscription>>;

    /// Active, not cancelled, `date_billing_next <= now`.
    async fn find_renewals_due(&self, now: DateTime<Utc>)
        -> RepositoryResult<Vec<DueSubscription>>;

    async fn reload(&self, subscription_id: Uuid) -> RepositoryResult<Option<DueSubscription>>;

    /// Unconditional insert-or-update.
    async fn save(&self, subscription: &UserSubscription) -> RepositoryResult<()>;

    async fn append_transaction(&self, transaction: &SubscriptionTransaction)
        -> RepositoryResult<()>;

    /// Writes `updated` only if the stored row still matches `expected` on
    /// `active`, `cancelled`, `date_billing_next` and `date_billing_end`;
    /// otherwise fails with `RepositoryError::Conflict` and writes nothing.
    async fn commit_transition(
        &self,
        expected: &UserSubscription,
        updated: &UserSubscription,
        transaction: Option<&SubscriptionTransaction>,
        membership: Option<MembershipChange>,
    ) -> RepositoryResult<()>;

    /// Active, not cancelled subscriptions of `subscriber_id` whose plan grants `group_id`.
    async fn count_active_in_group(
        &self,
        subscriber_id: Uuid,
        group_id: Uuid,
    ) -> RepositoryResult<i64>;
}

/// Group membership update applied inside `commit_transition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Grant { subscriber_id: Uuid, group_id: Uuid },
    /// Removes the group once the committed update leaves no active,
    /// not cancelled subscription of the subscriber that still grants it.
    RevokeIfLast { subscriber_id: Uuid, group_id: Uuid },
}

/// Entitlement group membership. Both operations are idempotent.
#[async_trait]
pub trait GroupMembership: Send + Sync {
    async fn add(&self, subscriber_id: Uuid, group_id: Uuid) -> RepositoryResult<()>;
    async fn remove(&self, subscriber_id: Uuid, group_id: Uuid) -> RepositoryResult<()>;
}

pub(crate) fn due_fields_match(stored: &UserSubscription, expected: &UserSubscription) -> bool {
    stored.active == expected.active
        && stored.cancelled == expected.cancelled
        && stored.date_billing_next == expected.date_billing_next
        && stored.date_billing_end == expected.date_billing_end
}

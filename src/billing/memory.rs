use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{RepositoryError, RepositoryResult};

use super::models::{
    DueSubscription, PlanCost, SubscriptionPlan, SubscriptionTransaction, UserSubscription,
};
use super::repository::{
    due_fields_match, GroupMembership, MembershipChange, SubscriptionRepository,
};

#[derive(Default)]
struct StoreState {
    plans: HashMap<Uuid, SubscriptionPlan>,
    costs: HashMap<Uuid, PlanCost>,
    subscriptions: HashMap<Uuid, UserSubscription>,
    transactions: Vec<SubscriptionTransaction>,
    memberships: HashSet<(Uuid, Uuid)>,
}

impl StoreState {
    fn join(&self, subscription: &UserSubscription) -> RepositoryResult<DueSubscription> {
        let cost = self
            .costs
            .get(&subscription.plan_cost_id)
            .ok_or_else(|| {
                RepositoryError::Message(format!(
                    "plan cost {} missing for subscription {}",
                    subscription.plan_cost_id, subscription.id
                ))
            })?;
        let plan = self.plans.get(&cost.plan_id).ok_or_else(|| {
            RepositoryError::Message(format!("plan {} missing for cost {}", cost.plan_id, cost.id))
        })?;

        Ok(DueSubscription {
            subscription: subscription.clone(),
            cost: cost.clone(),
            group_id: plan.group_id,
        })
    }

    fn select<P>(&self, predicate: P) -> RepositoryResult<Vec<DueSubscription>>
    where
        P: Fn(&UserSubscription) -> bool,
    {
        let mut matching: Vec<&UserSubscription> = self
            .subscriptions
            .values()
            .filter(|subscription| predicate(subscription))
            .collect();
        matching.sort_by_key(|subscription| {
            (subscription.subscriber_id, subscription.date_billing_start)
        });
        matching.into_iter().map(|subscription| self.join(subscription)).collect()
    }

    fn active_in_group(&self, subscriber_id: Uuid, group_id: Uuid) -> usize {
        self.subscriptions
            .values()
            .filter(|subscription| {
                subscription.subscriber_id == subscriber_id
                    && subscription.active
                    && !subscription.cancelled
            })
            .filter_map(|subscription| self.costs.get(&subscription.plan_cost_id))
            .filter_map(|cost| self.plans.get(&cost.plan_id))
            .filter(|plan| plan.group_id == Some(group_id))
            .count()
    }

    fn apply_membership(&mut self, change: MembershipChange) {
        match change {
            MembershipChange::Grant {
                subscriber_id,
                group_id,
            } => {
                self.memberships.insert((subscriber_id, group_id));
            }
            MembershipChange::RevokeIfLast {
                subscriber_id,
                group_id,
            } => {
                if self.active_in_group(subscriber_id, group_id) == 0 {
                    self.memberships.remove(&(subscriber_id, group_id));
                }
            }
        }
    }
}

/// key: billing-memory-store -> process-local repository
///
/// Backs both repository traits with one mutex so `commit_transition` is
/// atomic. Clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryBillingStore {
    inner: Arc<Mutex<StoreState>>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_plan(&self, plan: SubscriptionPlan) {
        self.state().plans.insert(plan.id, plan);
    }

    pub fn insert_cost(&self, cost: PlanCost) {
        self.state().costs.insert(cost.id, cost);
    }

    pub fn subscription(&self, subscription_id: Uuid) -> Option<UserSubscription> {
        self.state().subscriptions.get(&subscription_id).cloned()
    }

    pub fn transactions(&self) -> Vec<SubscriptionTransaction> {
        self.state().transactions.clone()
    }

    pub fn transactions_for(&self, subscriber_id: Uuid) -> Vec<SubscriptionTransaction> {
        self.state()
            .transactions
            .iter()
            .filter(|transaction| transaction.subscriber_id == subscriber_id)
            .cloned()
            .collect()
    }

    pub fn is_member(&self, subscriber_id: Uuid, group_id: Uuid) -> bool {
        self.state().memberships.contains(&(subscriber_id, group_id))
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryBillingStore {
    async fn find_expiring(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<DueSubscription>> {
        self.state().select(|subscription| subscription.is_expiry_due(now))
    }

    async fn find_newly_due(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<DueSubscription>> {
        self.state()
            .select(|subscription| subscription.is_activation_due(now))
    }

    async fn find_renewals_due(
        &self,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<DueSubscription>> {
        self.state().select(|subscription| subscription.is_renewal_due(now))
    }

    async fn reload(&self, subscription_id: Uuid) -> RepositoryResult<Option<DueSubscription>> {
        let state = self.state();
        state
            .subscriptions
            .get(&subscription_id)
            .map(|subscription| state.join(subscription))
            .transpose()
    }

    async fn save(&self, subscription: &UserSubscription) -> RepositoryResult<()> {
        self.state()
            .subscriptions
            .insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn append_transaction(
        &self,
        transaction: &SubscriptionTransaction,
    ) -> RepositoryResult<()> {
        self.state().transactions.push(transaction.clone());
        Ok(())
    }

    async fn commit_transition(
        &self,
        expected: &UserSubscription,
        updated: &UserSubscription,
        transaction: Option<&SubscriptionTransaction>,
        membership: Option<MembershipChange>,
    ) -> RepositoryResult<()> {
        let mut state = self.state();
        let stored = state
            .subscriptions
            .get_mut(&expected.id)
            .ok_or(RepositoryError::NotFound(expected.id))?;

        if !due_fields_match(stored, expected) {
            return Err(RepositoryError::Conflict(expected.id));
        }

        *stored = updated.clone();
        if let Some(transaction) = transaction {
            state.transactions.push(transaction.clone());
        }
        // counted after the update so the expiring subscription is excluded
        if let Some(change) = membership {
            state.apply_membership(change);
        }
        Ok(())
    }

    async fn count_active_in_group(
        &self,
        subscriber_id: Uuid,
        group_id: Uuid,
    ) -> RepositoryResult<i64> {
        Ok(self.state().active_in_group(subscriber_id, group_id) as i64)
    }
}

#[async_trait]
impl GroupMembership for InMemoryBillingStore {
    async fn add(&self, subscriber_id: Uuid, group_id: Uuid) -> RepositoryResult<()> {
        self.state().memberships.insert((subscriber_id, group_id));
        Ok(())
    }

    async fn remove(&self, subscriber_id: Uuid, group_id: Uuid) -> RepositoryResult<()> {
        self.state().memberships.remove(&(subscriber_id, group_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::models::RecurrenceUnit;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn seeded() -> (InMemoryBillingStore, PlanCost) {
        let store = InMemoryBillingStore::new();
        let plan = SubscriptionPlan {
            id: Uuid::new_v4(),
            plan_name: "Basic".to_string(),
            plan_description: String::new(),
            group_id: Some(Uuid::new_v4()),
            grace_period: 0,
            tags: Vec::new(),
        };
        let cost = PlanCost {
            id: Uuid::new_v4(),
            plan_id: plan.id,
            recurrence_period: 1,
            recurrence_unit: RecurrenceUnit::Month,
            cost: Decimal::new(999, 2),
        };
        store.insert_plan(plan);
        store.insert_cost(cost.clone());
        (store, cost)
    }

    #[tokio::test]
    async fn commit_rejects_stale_expected_state() {
        let (store, cost) = seeded();
        let start = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        let pending = UserSubscription::pending(Uuid::new_v4(), cost.id, start);
        store.save(&pending).await.unwrap();

        let mut stale = pending.clone();
        stale.active = true;
        let mut updated = pending.clone();
        updated.cancelled = true;
        let transaction = SubscriptionTransaction::for_charge(&pending, &cost, start);

        let err = store
            .commit_transition(&stale, &updated, Some(&transaction), None)
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::Conflict(id) if id == pending.id));
        assert_eq!(store.subscription(pending.id), Some(pending));
        assert!(store.transactions().is_empty());
    }

    #[tokio::test]
    async fn commit_writes_subscription_and_transaction_together() {
        let (store, cost) = seeded();
        let start = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        let pending = UserSubscription::pending(Uuid::new_v4(), cost.id, start);
        store.save(&pending).await.unwrap();

        let mut updated = pending.clone();
        updated.active = true;
        let transaction = SubscriptionTransaction::for_charge(&pending, &cost, start);
        store
            .commit_transition(&pending, &updated, Some(&transaction), None)
            .await
            .unwrap();

        assert_eq!(store.subscription(pending.id), Some(updated));
        assert_eq!(store.transactions_for(pending.subscriber_id), vec![transaction]);
    }

    #[tokio::test]
    async fn commit_applies_membership_change_with_the_update() {
        let (store, cost) = seeded();
        let start = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        let subscriber_id = Uuid::new_v4();
        let group_id = store.state().plans[&cost.plan_id].group_id.unwrap();
        let first = UserSubscription::pending(subscriber_id, cost.id, start);
        let second = UserSubscription::pending(subscriber_id, cost.id, start);
        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();

        let mut active_first = first.clone();
        active_first.active = true;
        let grant = MembershipChange::Grant {
            subscriber_id,
            group_id,
        };
        store
            .commit_transition(&first, &active_first, None, Some(grant))
            .await
            .unwrap();
        let mut active_second = second.clone();
        active_second.active = true;
        store
            .commit_transition(&second, &active_second, None, Some(grant))
            .await
            .unwrap();
        assert!(store.is_member(subscriber_id, group_id));

        let revoke = MembershipChange::RevokeIfLast {
            subscriber_id,
            group_id,
        };
        let mut expired_first = active_first.clone();
        expired_first.active = false;
        expired_first.cancelled = true;
        store
            .commit_transition(&active_first, &expired_first, None, Some(revoke))
            .await
            .unwrap();
        assert!(store.is_member(subscriber_id, group_id));

        // a rejected commit leaves membership untouched
        let mut expired_second = active_second.clone();
        expired_second.active = false;
        expired_second.cancelled = true;
        let err = store
            .commit_transition(&second, &expired_second, None, Some(revoke))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert!(store.is_member(subscriber_id, group_id));

        store
            .commit_transition(&active_second, &expired_second, None, Some(revoke))
            .await
            .unwrap();
        assert!(!store.is_member(subscriber_id, group_id));
        assert_eq!(store.count_active_in_group(subscriber_id, group_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn queries_join_cost_and_group() {
        let (store, cost) = seeded();
        let start = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        let pending = UserSubscription::pending(Uuid::new_v4(), cost.id, start);
        store.save(&pending).await.unwrap();

        let before = store
            .find_newly_due(start - chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert!(before.is_empty());

        let due = store.find_newly_due(start).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].cost, cost);
        assert!(due[0].group_id.is_some());
        assert!(store.find_renewals_due(start).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_transaction_is_listed_per_subscriber() {
        let (store, cost) = seeded();
        let start = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        let subscription = UserSubscription::pending(Uuid::new_v4(), cost.id, start);
        let other = UserSubscription::pending(Uuid::new_v4(), cost.id, start);

        let transaction = SubscriptionTransaction::for_charge(&subscription, &cost, start);
        store.append_transaction(&transaction).await.unwrap();
        store
            .append_transaction(&SubscriptionTransaction::for_charge(&other, &cost, start))
            .await
            .unwrap();

        assert_eq!(store.transactions().len(), 2);
        assert_eq!(store.transactions_for(subscription.subscriber_id), vec![transaction]);
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{RepositoryError, RepositoryResult};

use super::models::{
    DueSubscription, PlanCost, PlanTag, RecurrenceUnit, SubscriptionPlan,
    SubscriptionTransaction, UserSubscription,
};
use super::repository::{GroupMembership, MembershipChange, SubscriptionRepository};

const DUE_SUBSCRIPTION_SELECT: &str = r#"
    SELECT
        s.id,
        s.subscriber_id,
        s.plan_cost_id,
        s.date_billing_start,
        s.date_billing_end,
        s.date_billing_last,
        s.date_billing_next,
        s.active,
        s.cancelled,
        c.plan_id,
        c.recurrence_period,
        c.recurrence_unit,
        c.cost,
        p.group_id
    FROM user_subscriptions s
    JOIN plan_costs c ON c.id = s.plan_cost_id
    JOIN subscription_plans p ON p.id = c.plan_id
"#;

#[derive(Debug, FromRow)]
struct DueSubscriptionRow {
    id: Uuid,
    subscriber_id: Uuid,
    plan_cost_id: Uuid,
    date_billing_start: DateTime<Utc>,
    date_billing_end: Option<DateTime<Utc>>,
    date_billing_last: Option<DateTime<Utc>>,
    date_billing_next: Option<DateTime<Utc>>,
    active: bool,
    cancelled: bool,
    plan_id: Uuid,
    recurrence_period: i32,
    recurrence_unit: i16,
    cost: Decimal,
    group_id: Option<Uuid>,
}

impl TryFrom<DueSubscriptionRow> for DueSubscription {
    type Error = RepositoryError;

    fn try_from(row: DueSubscriptionRow) -> Result<Self, Self::Error> {
        Ok(DueSubscription {
            cost: PlanCost {
                id: row.plan_cost_id,
                plan_id: row.plan_id,
                recurrence_period: row.recurrence_period,
                recurrence_unit: RecurrenceUnit::try_from(row.recurrence_unit)?,
                cost: row.cost,
            },
            subscription: UserSubscription {
                id: row.id,
                subscriber_id: row.subscriber_id,
                plan_cost_id: row.plan_cost_id,
                date_billing_start: row.date_billing_start,
                date_billing_end: row.date_billing_end,
                date_billing_last: row.date_billing_last,
                date_billing_next: row.date_billing_next,
                active: row.active,
                cancelled: row.cancelled,
            },
            group_id: row.group_id,
        })
    }
}

#[derive(Debug, FromRow)]
struct PlanRow {
    id: Uuid,
    plan_name: String,
    plan_description: String,
    group_id: Option<Uuid>,
    grace_period: i32,
}

/// key: billing-postgres-store -> sqlx repository
#[derive(Clone)]
pub struct PgBillingStore {
    pool: PgPool,
}

impl PgBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn due_where(
        &self,
        condition: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<DueSubscription>> {
        let query = format!(
            "{DUE_SUBSCRIPTION_SELECT} WHERE {condition} ORDER BY s.subscriber_id, s.date_billing_start"
        );
        sqlx::query_as::<_, DueSubscriptionRow>(&query)
            .bind(now)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(DueSubscription::try_from)
            .collect()
    }

    /// Inserts the plan and links its tags, creating tags that do not exist yet.
    pub async fn insert_plan(&self, plan: &SubscriptionPlan) -> RepositoryResult<()> {
        let grace_period = i32::try_from(plan.grace_period).map_err(|_| {
            RepositoryError::Message(format!("grace period {} too large", plan.grace_period))
        })?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO subscription_plans (id, plan_name, plan_description, group_id, grace_period)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(plan.id)
        .bind(&plan.plan_name)
        .bind(&plan.plan_description)
        .bind(plan.group_id)
        .bind(grace_period)
        .execute(&mut *tx)
        .await?;

        for tag in &plan.tags {
            let tag_id: i32 = sqlx::query_scalar(
                r#"
                INSERT INTO plan_tags (tag) VALUES ($1)
                ON CONFLICT (tag) DO UPDATE SET tag = EXCLUDED.tag
                RETURNING id
                "#,
            )
            .bind(&tag.tag)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO subscription_plan_tags (plan_id, tag_id) VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(plan.id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn plan(&self, plan_id: Uuid) -> RepositoryResult<Option<SubscriptionPlan>> {
        let Some(row) = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT id, plan_name, plan_description, group_id, grace_period
            FROM subscription_plans
            WHERE id = $1
            "#,
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let tags = sqlx::query_as::<_, (i32, String)>(
            r#"
            SELECT t.id, t.tag
            FROM plan_tags t
            JOIN subscription_plan_tags pt ON pt.tag_id = t.id
            WHERE pt.plan_id = $1
            ORDER BY t.tag
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(id, tag)| PlanTag { id, tag })
        .collect();

        Ok(Some(SubscriptionPlan {
            id: row.id,
            plan_name: row.plan_name,
            plan_description: row.plan_description,
            group_id: row.group_id,
            grace_period: u32::try_from(row.grace_period).unwrap_or(0),
            tags,
        }))
    }

    pub async fn insert_cost(&self, cost: &PlanCost) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO plan_costs (id, plan_id, recurrence_period, recurrence_unit, cost)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(cost.id)
        .bind(cost.plan_id)
        .bind(cost.recurrence_period)
        .bind(cost.recurrence_unit.code())
        .bind(cost.cost)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn transactions_for(
        &self,
        subscriber_id: Uuid,
    ) -> RepositoryResult<Vec<SubscriptionTransaction>> {
        let rows = sqlx::query_as::<_, SubscriptionTransaction>(
            r#"
            SELECT id, subscriber_id, plan_cost_id, date_transaction, amount
            FROM subscription_transactions
            WHERE subscriber_id = $1
            ORDER BY date_transaction, id
            "#,
        )
        .bind(subscriber_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn is_member(&self, subscriber_id: Uuid, group_id: Uuid) -> RepositoryResult<bool> {
        let member: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM subscriber_groups WHERE subscriber_id = $1 AND group_id = $2
            )
            "#,
        )
        .bind(subscriber_id)
        .bind(group_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(member)
    }
}

async fn insert_transaction(
    conn: &mut PgConnection,
    transaction: &SubscriptionTransaction,
) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO subscription_transactions (id, subscriber_id, plan_cost_id, date_transaction, amount)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(transaction.id)
    .bind(transaction.subscriber_id)
    .bind(transaction.plan_cost_id)
    .bind(transaction.date_transaction)
    .bind(transaction.amount)
    .execute(conn)
    .await?;
    Ok(())
}

async fn count_active(
    conn: &mut PgConnection,
    subscriber_id: Uuid,
    group_id: Uuid,
) -> RepositoryResult<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM user_subscriptions s
        JOIN plan_costs c ON c.id = s.plan_cost_id
        JOIN subscription_plans p ON p.id = c.plan_id
        WHERE s.subscriber_id = $1
          AND p.group_id = $2
          AND s.active
          AND NOT s.cancelled
        "#,
    )
    .bind(subscriber_id)
    .bind(group_id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

async fn insert_membership(
    conn: &mut PgConnection,
    subscriber_id: Uuid,
    group_id: Uuid,
) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO subscriber_groups (subscriber_id, group_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(subscriber_id)
    .bind(group_id)
    .execute(conn)
    .await?;
    Ok(())
}

async fn delete_membership(
    conn: &mut PgConnection,
    subscriber_id: Uuid,
    group_id: Uuid,
) -> RepositoryResult<()> {
    sqlx::query("DELETE FROM subscriber_groups WHERE subscriber_id = $1 AND group_id = $2")
        .bind(subscriber_id)
        .bind(group_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Runs on the transition's connection after the subscription row is updated.
async fn apply_membership(conn: &mut PgConnection, change: MembershipChange) -> RepositoryResult<()> {
    match change {
        MembershipChange::Grant {
            subscriber_id,
            group_id,
        } => insert_membership(conn, subscriber_id, group_id).await,
        MembershipChange::RevokeIfLast {
            subscriber_id,
            group_id,
        } => {
            if count_active(&mut *conn, subscriber_id, group_id).await? > 0 {
                return Ok(());
            }
            delete_membership(conn, subscriber_id, group_id).await
        }
    }
}

#[async_trait]
impl SubscriptionRepository for PgBillingStore {
    async fn find_expiring(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<DueSubscription>> {
        self.due_where(
            "s.active AND NOT s.cancelled AND s.date_billing_end <= $1",
            now,
        )
        .await
    }

    async fn find_newly_due(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<DueSubscription>> {
        self.due_where(
            "NOT s.active AND NOT s.cancelled AND s.date_billing_start <= $1",
            now,
        )
        .await
    }

    async fn find_renewals_due(
        &self,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<DueSubscription>> {
        self.due_where(
            "s.active AND NOT s.cancelled AND s.date_billing_next <= $1",
            now,
        )
        .await
    }

    async fn reload(&self, subscription_id: Uuid) -> RepositoryResult<Option<DueSubscription>> {
        let query = format!("{DUE_SUBSCRIPTION_SELECT} WHERE s.id = $1");
        sqlx::query_as::<_, DueSubscriptionRow>(&query)
            .bind(subscription_id)
            .fetch_optional(&self.pool)
            .await?
            .map(DueSubscription::try_from)
            .transpose()
    }

    async fn save(&self, subscription: &UserSubscription) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_subscriptions (
                id,
                subscriber_id,
                plan_cost_id,
                date_billing_start,
                date_billing_end,
                date_billing_last,
                date_billing_next,
                active,
                cancelled
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id)
            DO UPDATE SET
                subscriber_id = EXCLUDED.subscriber_id,
                plan_cost_id = EXCLUDED.plan_cost_id,
                date_billing_start = EXCLUDED.date_billing_start,
                date_billing_end = EXCLUDED.date_billing_end,
                date_billing_last = EXCLUDED.date_billing_last,
                date_billing_next = EXCLUDED.date_billing_next,
                active = EXCLUDED.active,
                cancelled = EXCLUDED.cancelled
            "#,
        )
        .bind(subscription.id)
        .bind(subscription.subscriber_id)
        .bind(subscription.plan_cost_id)
        .bind(subscription.date_billing_start)
        .bind(subscription.date_billing_end)
        .bind(subscription.date_billing_last)
        .bind(subscription.date_billing_next)
        .bind(subscription.active)
        .bind(subscription.cancelled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_transaction(
        &self,
        transaction: &SubscriptionTransaction,
    ) -> RepositoryResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_transaction(&mut conn, transaction).await
    }

    async fn commit_transition(
        &self,
        expected: &UserSubscription,
        updated: &UserSubscription,
        transaction: Option<&SubscriptionTransaction>,
        membership: Option<MembershipChange>,
    ) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE user_subscriptions
            SET
                date_billing_end = $2,
                date_billing_last = $3,
                date_billing_next = $4,
                active = $5,
                cancelled = $6
            WHERE id = $1
              AND active = $7
              AND cancelled = $8
              AND date_billing_next IS NOT DISTINCT FROM $9
              AND date_billing_end IS NOT DISTINCT FROM $10
            "#,
        )
        .bind(expected.id)
        .bind(updated.date_billing_end)
        .bind(updated.date_billing_last)
        .bind(updated.date_billing_next)
        .bind(updated.active)
        .bind(updated.cancelled)
        .bind(expected.active)
        .bind(expected.cancelled)
        .bind(expected.date_billing_next)
        .bind(expected.date_billing_end)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM user_subscriptions WHERE id = $1)")
                    .bind(expected.id)
                    .fetch_one(&self.pool)
                    .await?;
            return Err(if exists {
                RepositoryError::Conflict(expected.id)
            } else {
                RepositoryError::NotFound(expected.id)
            });
        }

        if let Some(transaction) = transaction {
            insert_transaction(&mut tx, transaction).await?;
        }
        if let Some(change) = membership {
            apply_membership(&mut tx, change).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn count_active_in_group(
        &self,
        subscriber_id: Uuid,
        group_id: Uuid,
    ) -> RepositoryResult<i64> {
        let mut conn = self.pool.acquire().await?;
        count_active(&mut conn, subscriber_id, group_id).await
    }
}

#[async_trait]
impl GroupMembership for PgBillingStore {
    async fn add(&self, subscriber_id: Uuid, group_id: Uuid) -> RepositoryResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_membership(&mut conn, subscriber_id, group_id).await
    }

    async fn remove(&self, subscriber_id: Uuid, group_id: Uuid) -> RepositoryResult<()> {
        let mut conn = self.pool.acquire().await?;
        delete_membership(&mut conn, subscriber_id, group_id).await
    }
}

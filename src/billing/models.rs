use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{BillingError, InvalidRecurrenceError};

/// key: billing-recurrence-unit -> stored as smallint codes 0..=7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceUnit {
    Once,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl RecurrenceUnit {
    pub const ALL: [RecurrenceUnit; 8] = [
        RecurrenceUnit::Once,
        RecurrenceUnit::Second,
        RecurrenceUnit::Minute,
        RecurrenceUnit::Hour,
        RecurrenceUnit::Day,
        RecurrenceUnit::Week,
        RecurrenceUnit::Month,
        RecurrenceUnit::Year,
    ];

    pub fn code(&self) -> i16 {
        match self {
            RecurrenceUnit::Once => 0,
            RecurrenceUnit::Second => 1,
            RecurrenceUnit::Minute => 2,
            RecurrenceUnit::Hour => 3,
            RecurrenceUnit::Day => 4,
            RecurrenceUnit::Week => 5,
            RecurrenceUnit::Month => 6,
            RecurrenceUnit::Year => 7,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, InvalidRecurrenceError> {
        match code {
            0 => Ok(RecurrenceUnit::Once),
            1 => Ok(RecurrenceUnit::Second),
            2 => Ok(RecurrenceUnit::Minute),
            3 => Ok(RecurrenceUnit::Hour),
            4 => Ok(RecurrenceUnit::Day),
            5 => Ok(RecurrenceUnit::Week),
            6 => Ok(RecurrenceUnit::Month),
            7 => Ok(RecurrenceUnit::Year),
            other => Err(InvalidRecurrenceError::UnknownUnit(other)),
        }
    }

    /// Text used when a cost is billed once per unit.
    pub fn singular_text(&self) -> &'static str {
        match self {
            RecurrenceUnit::Once => "one-time",
            RecurrenceUnit::Second => "per second",
            RecurrenceUnit::Minute => "per minute",
            RecurrenceUnit::Hour => "per hour",
            RecurrenceUnit::Day => "per day",
            RecurrenceUnit::Week => "per week",
            RecurrenceUnit::Month => "per month",
            RecurrenceUnit::Year => "per year",
        }
    }

    pub fn plural_text(&self) -> &'static str {
        match self {
            RecurrenceUnit::Once => "one-time",
            RecurrenceUnit::Second => "seconds",
            RecurrenceUnit::Minute => "minutes",
            RecurrenceUnit::Hour => "hours",
            RecurrenceUnit::Day => "days",
            RecurrenceUnit::Week => "weeks",
            RecurrenceUnit::Month => "months",
            RecurrenceUnit::Year => "years",
        }
    }
}

impl TryFrom<i16> for RecurrenceUnit {
    type Error = InvalidRecurrenceError;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        RecurrenceUnit::from_code(i64::from(code))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTag {
    pub id: i32,
    pub tag: String,
}

/// key: billing-plan-model -> entitlement group + grace period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub plan_name: String,
    pub plan_description: String,
    pub group_id: Option<Uuid>,
    /// Days past `date_billing_end` before access is hard locked.
    pub grace_period: u32,
    pub tags: Vec<PlanTag>,
}

impl SubscriptionPlan {
    /// Comma separated tag names, truncated after the third.
    pub fn display_tags(&self) -> String {
        let shown = self
            .tags
            .iter()
            .take(3)
            .map(|tag| tag.tag.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        if self.tags.len() > 3 {
            format!("{shown}, ...")
        } else {
            shown
        }
    }
}

/// key: billing-plan-cost -> price per recurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanCost {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub recurrence_period: i32,
    pub recurrence_unit: RecurrenceUnit,
    pub cost: Decimal,
}

impl PlanCost {
    pub fn display_recurrent_unit_text(&self) -> &'static str {
        self.recurrence_unit.singular_text()
    }

    pub fn display_billing_frequency_text(&self) -> String {
        if self.recurrence_unit == RecurrenceUnit::Once {
            return self.recurrence_unit.singular_text().to_string();
        }

        if self.recurrence_period == 1 {
            return self.recurrence_unit.singular_text().to_string();
        }

        format!(
            "every {} {}",
            self.recurrence_period,
            self.recurrence_unit.plural_text()
        )
    }
}

/// key: billing-user-subscription -> lifecycle fields
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct UserSubscription {
    pub id: Uuid,
    pub subscriber_id: Uuid,
    pub plan_cost_id: Uuid,
    pub date_billing_start: DateTime<Utc>,
    pub date_billing_end: Option<DateTime<Utc>>,
    pub date_billing_last: Option<DateTime<Utc>>,
    pub date_billing_next: Option<DateTime<Utc>>,
    pub active: bool,
    pub cancelled: bool,
}

impl UserSubscription {
    /// An unbilled subscription waiting for its first charge at `start`.
    pub fn pending(subscriber_id: Uuid, plan_cost_id: Uuid, start: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscriber_id,
            plan_cost_id,
            date_billing_start: start,
            date_billing_end: None,
            date_billing_last: None,
            date_billing_next: Some(start),
            active: false,
            cancelled: false,
        }
    }

    pub fn is_expiry_due(&self, now: DateTime<Utc>) -> bool {
        self.active
            && !self.cancelled
            && self.date_billing_end.map(|end| end <= now).unwrap_or(false)
    }

    pub fn is_activation_due(&self, now: DateTime<Utc>) -> bool {
        !self.active && !self.cancelled && self.date_billing_start <= now
    }

    pub fn is_renewal_due(&self, now: DateTime<Utc>) -> bool {
        self.active
            && !self.cancelled
            && self.date_billing_next.map(|next| next <= now).unwrap_or(false)
    }

    pub fn state(&self) -> SubscriptionState {
        match (self.active, self.cancelled) {
            (_, true) => SubscriptionState::Cancelled,
            (true, false) => SubscriptionState::Active,
            (false, false) => SubscriptionState::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Pending,
    Active,
    Cancelled,
}

/// Append-only record of one successful charge.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SubscriptionTransaction {
    pub id: Uuid,
    pub subscriber_id: Uuid,
    pub plan_cost_id: Uuid,
    pub date_transaction: DateTime<Utc>,
    pub amount: Decimal,
}

impl SubscriptionTransaction {
    pub fn for_charge(
        subscription: &UserSubscription,
        cost: &PlanCost,
        settled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscriber_id: subscription.subscriber_id,
            plan_cost_id: cost.id,
            date_transaction: settled_at,
            amount: cost.cost,
        }
    }
}

/// A subscription joined with the cost it bills and the plan's entitlement group.
#[derive(Debug, Clone, PartialEq)]
pub struct DueSubscription {
    pub subscription: UserSubscription,
    pub cost: PlanCost,
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    Expiration,
    Activation,
    Renewal,
}

impl BatchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchPhase::Expiration => "expiration",
            BatchPhase::Activation => "activation",
            BatchPhase::Renewal => "renewal",
        }
    }

    pub fn is_due(&self, subscription: &UserSubscription, now: DateTime<Utc>) -> bool {
        match self {
            BatchPhase::Expiration => subscription.is_expiry_due(now),
            BatchPhase::Activation => subscription.is_activation_due(now),
            BatchPhase::Renewal => subscription.is_renewal_due(now),
        }
    }
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct SubscriptionFailure {
    pub subscription_id: Uuid,
    pub phase: BatchPhase,
    pub error: BillingError,
}

/// key: billing-batch-result -> counts + isolated failures
#[derive(Debug, Default)]
pub struct BatchResult {
    pub processed: usize,
    pub charged: usize,
    pub failed: usize,
    pub expired: usize,
    pub skipped: usize,
    pub failures: Vec<SubscriptionFailure>,
}

impl BatchResult {
    pub(crate) fn record_failure(
        &mut self,
        subscription_id: Uuid,
        phase: BatchPhase,
        error: BillingError,
    ) {
        self.failed += 1;
        self.failures.push(SubscriptionFailure {
            subscription_id,
            phase,
            error,
        });
    }
}

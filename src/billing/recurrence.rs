use chrono::{DateTime, Duration, Utc};

use crate::error::InvalidRecurrenceError;

use super::models::{PlanCost, RecurrenceUnit};

const MILLIS_PER_SECOND: i64 = 1_000;
const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;
const MILLIS_PER_WEEK: i64 = 7 * MILLIS_PER_DAY;
/// 30.4368 days, the mean Gregorian month.
const MILLIS_PER_AVERAGE_MONTH: i64 = 2_629_739_520;
/// 365.2425 days, the mean Gregorian year.
const MILLIS_PER_AVERAGE_YEAR: i64 = 31_556_952_000;

/// key: billing-recurrence -> next billing timestamp
///
/// Months and years advance by their Gregorian averages rather than by
/// calendar months, so billing dates drift slowly against the calendar.
pub struct RecurrenceCalculator;

impl RecurrenceCalculator {
    /// Returns `None` when nothing further is billed (one-time costs).
    pub fn next_billing_time(
        current: DateTime<Utc>,
        period: i64,
        unit: RecurrenceUnit,
    ) -> Result<Option<DateTime<Utc>>, InvalidRecurrenceError> {
        let unit_millis = match unit {
            RecurrenceUnit::Once => return Ok(None),
            RecurrenceUnit::Second => MILLIS_PER_SECOND,
            RecurrenceUnit::Minute => MILLIS_PER_MINUTE,
            RecurrenceUnit::Hour => MILLIS_PER_HOUR,
            RecurrenceUnit::Day => MILLIS_PER_DAY,
            RecurrenceUnit::Week => MILLIS_PER_WEEK,
            RecurrenceUnit::Month => MILLIS_PER_AVERAGE_MONTH,
            RecurrenceUnit::Year => MILLIS_PER_AVERAGE_YEAR,
        };

        if period <= 0 {
            return Err(InvalidRecurrenceError::NonPositivePeriod(period));
        }

        let offset = period
            .checked_mul(unit_millis)
            .ok_or(InvalidRecurrenceError::OutOfRange)?;

        current
            .checked_add_signed(Duration::milliseconds(offset))
            .map(Some)
            .ok_or(InvalidRecurrenceError::OutOfRange)
    }
}

impl PlanCost {
    pub fn next_billing_datetime(
        &self,
        current: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, InvalidRecurrenceError> {
        RecurrenceCalculator::next_billing_time(
            current,
            i64::from(self.recurrence_period),
            self.recurrence_unit,
        )
    }
}

//! Schedule calculator.
//!
//! All arithmetic happens on calendar dates; the time of day of a due
//! timestamp is always midnight.

use crate::model::task::Frequency;
use std::error::Error;
use std::fmt::{Display, Formatter};
use time::{Date, Duration, Month, PrimitiveDateTime, Time};

/// Errors from schedule advancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// `Frequency::Once` has no next occurrence.
    NonRecurring,
    /// The next occurrence falls outside the supported calendar range.
    OutOfRange(Date),
}

impl Display for ScheduleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonRecurring => write!(f, "one-off tasks have no next occurrence"),
            Self::OutOfRange(date) => {
                write!(f, "next occurrence after {date} is out of calendar range")
            }
        }
    }
}

impl Error for ScheduleError {}

/// Returns the first due timestamp: start of `start_date`.
pub fn first_due(start_date: Date) -> PrimitiveDateTime {
    PrimitiveDateTime::new(start_date, Time::MIDNIGHT)
}

/// Returns the due timestamp following `due` for a recurring `frequency`.
///
/// # Contract
/// - `Daily` +1 day, `EveryOtherDay` +2 days, `Weekly` +7 days,
///   `EveryOtherWeek` +14 days.
/// - `Monthly` +1 calendar month, day-of-month clamped to the target month.
/// - The result is normalized to the start of its day.
///
/// # Errors
/// - `NonRecurring` for `Frequency::Once`.
/// - `OutOfRange` when the result would exceed `Date::MAX`.
pub fn next_after(
    due: PrimitiveDateTime,
    frequency: Frequency,
) -> Result<PrimitiveDateTime, ScheduleError> {
    let date = due.date();
    let next = match frequency {
        Frequency::Once => return Err(ScheduleError::NonRecurring),
        Frequency::Daily => add_days(date, 1),
        Frequency::EveryOtherDay => add_days(date, 2),
        Frequency::Weekly => add_days(date, 7),
        Frequency::EveryOtherWeek => add_days(date, 14),
        Frequency::Monthly => add_one_month(date),
    }
    .ok_or(ScheduleError::OutOfRange(date))?;

    Ok(first_due(next))
}

fn add_days(date: Date, days: i64) -> Option<Date> {
    date.checked_add(Duration::days(days))
}

fn add_one_month(date: Date) -> Option<Date> {
    let (year, month) = match date.month() {
        Month::December => (date.year().checked_add(1)?, Month::January),
        other => (date.year(), other.next()),
    };

    // Shorter target months clamp to their last day (28..=31).
    (28..=date.day())
        .rev()
        .find_map(|day| Date::from_calendar_date(year, month, day).ok())
        .or_else(|| Date::from_calendar_date(year, month, date.day()).ok())
}

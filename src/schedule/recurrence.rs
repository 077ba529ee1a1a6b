//! Expansion of a [`WindowSpec`] into concrete session dates.
//!
//! This is the only place dates are generated; template creation and
//! regeneration both call [`generate`].

use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::schedule::window::{DatePolicy, DayOfWeek, WindowSpec};

/// One generated occurrence, before it becomes a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDate {
    pub scheduled_date: NaiveDate,
    /// `None` when the window opens and closes on the same day.
    pub scheduled_end_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
}

/// Expand `spec` into dated occurrences, ascending by date.
///
/// Empty inputs (no specific dates, an inverted date range, or no matching
/// weekday inside the range) produce an empty list rather than an error.
/// Excluded dates are dropped without shifting the remaining ones.
pub fn generate(spec: &WindowSpec) -> Vec<SessionDate> {
    if spec.is_inverted_same_day() {
        tracing::warn!(
            "Window closes earlier than it opens on the same day; treating it as a same-day window"
        );
    }

    let span = spec.span_days();
    let time = spec.window.map(|w| w.start_time);
    let occurrence = |date: NaiveDate| SessionDate {
        scheduled_date: date,
        scheduled_end_date: if span > 0 {
            date.checked_add_days(Days::new(u64::from(span)))
        } else {
            None
        },
        scheduled_time: time,
    };

    match &spec.dates {
        DatePolicy::Recurring {
            start_date,
            end_date,
        } => {
            let Some(window) = spec.window else {
                return Vec::new();
            };
            weekly_dates(window.start_day, *start_date, *end_date)
                .filter(|d| !spec.exclude_dates.contains(d))
                .map(occurrence)
                .collect()
        }
        DatePolicy::Specific { dates } => {
            let mut dates = dates.clone();
            dates.sort_unstable();
            dates.dedup();
            dates
                .into_iter()
                .filter(|d| !spec.exclude_dates.contains(d))
                .map(occurrence)
                .collect()
        }
    }
}

/// Every date in `start..=end` falling on `day`.
fn weekly_dates(
    day: DayOfWeek,
    start: NaiveDate,
    end: NaiveDate,
) -> impl Iterator<Item = NaiveDate> {
    let offset = DayOfWeek::of(start).days_until(day);
    let first = start.checked_add_days(Days::new(u64::from(offset)));
    std::iter::successors(first, |d| d.checked_add_days(Days::new(7)))
        .take_while(move |d| *d <= end)
}

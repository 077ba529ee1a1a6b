use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Day of week, numbered from Sunday (SUN = 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayOfWeek {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sun,
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
        DayOfWeek::Sat,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn of(date: NaiveDate) -> Self {
        Self::ALL[date.weekday().num_days_from_sunday() as usize]
    }

    /// Days from `self` forward to `other`, wrapping at the week boundary.
    pub fn days_until(self, other: DayOfWeek) -> u32 {
        (other.index() + 7 - self.index()) % 7
    }
}

impl std::fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DayOfWeek::Sun => "SUN",
            DayOfWeek::Mon => "MON",
            DayOfWeek::Tue => "TUE",
            DayOfWeek::Wed => "WED",
            DayOfWeek::Thu => "THU",
            DayOfWeek::Fri => "FRI",
            DayOfWeek::Sat => "SAT",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sun" | "sunday" => Ok(DayOfWeek::Sun),
            "mon" | "monday" => Ok(DayOfWeek::Mon),
            "tue" | "tuesday" => Ok(DayOfWeek::Tue),
            "wed" | "wednesday" => Ok(DayOfWeek::Wed),
            "thu" | "thursday" => Ok(DayOfWeek::Thu),
            "fri" | "friday" => Ok(DayOfWeek::Fri),
            "sat" | "saturday" => Ok(DayOfWeek::Sat),
            other => Err(format!("unknown day of week: {other}")),
        }
    }
}

/// A weekly window: opens on `start_day` at `start_time`, closes on
/// `end_day` at `end_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyWindow {
    pub start_day: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_day: DayOfWeek,
    pub end_time: NaiveTime,
}

impl WeeklyWindow {
    /// Number of days between opening and closing, in 0..=6.
    ///
    /// Equal days always give 0, even when the window closes earlier in the
    /// day than it opens.
    pub fn span_days(&self) -> u32 {
        self.start_day.days_until(self.end_day)
    }

    pub fn is_inverted_same_day(&self) -> bool {
        self.start_day == self.end_day && self.end_time < self.start_time
    }
}

/// Which calendar dates a window applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DatePolicy {
    /// One candidate per calendar week between the inclusive bounds.
    Recurring {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    /// An explicit list of dates.
    Specific { dates: Vec<NaiveDate> },
}

/// Everything the recurrence generator needs. Built and validated by
/// [`JobTemplate::window_spec`](crate::template::JobTemplate::window_spec).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// `None` only for one-time templates without a weekly window.
    pub window: Option<WeeklyWindow>,
    pub dates: DatePolicy,
    #[serde(default)]
    pub exclude_dates: BTreeSet<NaiveDate>,
}

impl WindowSpec {
    pub fn span_days(&self) -> u32 {
        self.window.map(|w| w.span_days()).unwrap_or(0)
    }

    pub fn is_inverted_same_day(&self) -> bool {
        self.window.is_some_and(|w| w.is_inverted_same_day())
    }
}

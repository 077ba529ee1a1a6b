use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::schedule::{DatePolicy, DayOfWeek, WeeklyWindow, WindowSpec};

pub type TemplateId = Uuid;
pub type EmployerId = Uuid;

/// Employer-authored recurrence contract from which sessions are generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTemplate {
    #[serde(default = "Uuid::new_v4")]
    pub id: TemplateId,
    pub employer_id: EmployerId,
    #[serde(default)]
    pub title: String,
    pub job_code: String,
    #[serde(default)]
    pub window_start_day: Option<DayOfWeek>,
    #[serde(default)]
    pub time_window_start: Option<NaiveTime>,
    #[serde(default)]
    pub window_end_day: Option<DayOfWeek>,
    #[serde(default)]
    pub time_window_end: Option<NaiveTime>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub specific_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub exclude_dates: BTreeSet<NaiveDate>,
    /// Highest session counter ever issued for this template.
    #[serde(default)]
    pub issued_sessions: u32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl JobTemplate {
    pub fn new(employer_id: EmployerId, job_code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            employer_id,
            title: String::new(),
            job_code: job_code.into(),
            window_start_day: None,
            time_window_start: None,
            window_end_day: None,
            time_window_end: None,
            is_recurring: false,
            start_date: None,
            end_date: None,
            specific_dates: Vec::new(),
            exclude_dates: BTreeSet::new(),
            issued_sessions: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_window(
        mut self,
        start_day: DayOfWeek,
        start_time: NaiveTime,
        end_day: DayOfWeek,
        end_time: NaiveTime,
    ) -> Self {
        self.window_start_day = Some(start_day);
        self.time_window_start = Some(start_time);
        self.window_end_day = Some(end_day);
        self.time_window_end = Some(end_time);
        self
    }

    pub fn recurring(mut self, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        self.is_recurring = true;
        self.start_date = Some(start_date);
        self.end_date = Some(end_date);
        self
    }

    pub fn on_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.is_recurring = false;
        self.specific_dates = dates.into_iter().collect();
        self
    }

    pub fn excluding(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.exclude_dates.extend(dates);
        self
    }

    /// Load a template from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Validate the window fields and build the generator input.
    ///
    /// The four window fields must be all set or all empty. A template
    /// without a window may only use explicit dates.
    pub fn window_spec(&self) -> Result<WindowSpec> {
        if self.job_code.trim().is_empty() {
            return Err(EngineError::InvalidWindowSpec(
                "job_code must not be empty".to_string(),
            ));
        }

        let window = match (
            self.window_start_day,
            self.time_window_start,
            self.window_end_day,
            self.time_window_end,
        ) {
            (Some(start_day), Some(start_time), Some(end_day), Some(end_time)) => {
                Some(WeeklyWindow {
                    start_day,
                    start_time,
                    end_day,
                    end_time,
                })
            }
            (None, None, None, None) => None,
            _ => {
                return Err(EngineError::InvalidWindowSpec(
                    "window days and times must be all set or all empty".to_string(),
                ))
            }
        };

        let dates = if self.is_recurring {
            if window.is_none() {
                return Err(EngineError::InvalidWindowSpec(
                    "recurring templates need a weekly window".to_string(),
                ));
            }
            match (self.start_date, self.end_date) {
                (Some(start_date), Some(end_date)) => DatePolicy::Recurring {
                    start_date,
                    end_date,
                },
                _ => {
                    return Err(EngineError::InvalidWindowSpec(
                        "recurring templates need start_date and end_date".to_string(),
                    ))
                }
            }
        } else {
            DatePolicy::Specific {
                dates: self.specific_dates.clone(),
            }
        };

        Ok(WindowSpec {
            window,
            dates,
            exclude_dates: self.exclude_dates.clone(),
        })
    }
}

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::template::TemplateId;

pub type SessionId = Uuid;
pub type EmployeeId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Offered,
    Claimed,
    Approved,
    Refused,
    InProgress,
    Completed,
    Evaluated,
    Cancelled,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 8] = [
        SessionStatus::Offered,
        SessionStatus::Claimed,
        SessionStatus::Approved,
        SessionStatus::Refused,
        SessionStatus::InProgress,
        SessionStatus::Completed,
        SessionStatus::Evaluated,
        SessionStatus::Cancelled,
    ];

    /// The lifecycle transition table.
    pub fn can_transition_to(self, to: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, to),
            (Offered, Claimed)
                | (Claimed, Offered)
                | (Claimed, Approved)
                | (Claimed, Refused)
                | (Approved, InProgress)
                | (Offered, Cancelled)
                | (Claimed, Cancelled)
                | (Approved, Cancelled)
                | (InProgress, Completed)
                | (Completed, Evaluated)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Evaluated | SessionStatus::Cancelled | SessionStatus::Refused
        )
    }

    /// Someone holds the session and work is pending or underway.
    /// Templates with live sessions cannot be deleted.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            SessionStatus::Claimed
                | SessionStatus::Approved
                | SessionStatus::InProgress
                | SessionStatus::Completed
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Offered => write!(f, "OFFERED"),
            SessionStatus::Claimed => write!(f, "CLAIMED"),
            SessionStatus::Approved => write!(f, "APPROVED"),
            SessionStatus::Refused => write!(f, "REFUSED"),
            SessionStatus::InProgress => write!(f, "IN_PROGRESS"),
            SessionStatus::Completed => write!(f, "COMPLETED"),
            SessionStatus::Evaluated => write!(f, "EVALUATED"),
            SessionStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionStatus::ALL
            .into_iter()
            .find(|status| status.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown session status: {s}"))
    }
}

/// Customer feedback attached when a completed session is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// 1 to 5.
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub evaluated_at: DateTime<Utc>,
}

impl Evaluation {
    pub fn new(rating: u8, comment: Option<String>) -> Self {
        Self {
            rating,
            comment,
            evaluated_at: Utc::now(),
        }
    }
}

/// Progress of the external per-session checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChecklistProgress {
    pub required: u32,
    pub done: u32,
}

impl ChecklistProgress {
    pub fn new(required: u32, done: u32) -> Self {
        Self { required, done }
    }

    pub fn remaining(&self) -> u32 {
        self.required.saturating_sub(self.done)
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }
}

/// One concrete, dated occurrence of a job template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSession {
    pub id: SessionId,
    pub template_id: TemplateId,
    pub session_code: String,
    pub full_job_code: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_end_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
    pub status: SessionStatus,
    pub assigned_to: Option<EmployeeId>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub evaluation: Option<Evaluation>,
    pub created_at: DateTime<Utc>,
}

impl JobSession {
    /// A fresh, unassigned session in OFFERED state.
    pub fn offered(
        template_id: TemplateId,
        session_code: String,
        full_job_code: String,
        scheduled_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            template_id,
            session_code,
            full_job_code,
            scheduled_date,
            scheduled_end_date: None,
            scheduled_time: None,
            status: SessionStatus::Offered,
            assigned_to: None,
            started_at: None,
            completed_at: None,
            evaluation: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_assigned_to(&self, employee_id: EmployeeId) -> bool {
        self.assigned_to == Some(employee_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_has_ten_edges() {
        let edges = SessionStatus::ALL
            .iter()
            .flat_map(|from| SessionStatus::ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .count();
        assert_eq!(edges, 10);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in SessionStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in SessionStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn completed_cannot_skip_to_cancelled() {
        assert!(!SessionStatus::Completed.can_transition_to(SessionStatus::Cancelled));
        assert!(!SessionStatus::InProgress.can_transition_to(SessionStatus::Cancelled));
    }

    #[test]
    fn status_display_round_trips_through_from_str() {
        assert_eq!(SessionStatus::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!(
            "in_progress".parse::<SessionStatus>().unwrap(),
            SessionStatus::InProgress
        );
        assert!("LOST".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn status_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
    }

    #[test]
    fn checklist_progress() {
        assert!(ChecklistProgress::default().is_complete());
        assert_eq!(ChecklistProgress::new(4, 1).remaining(), 3);
        assert!(ChecklistProgress::new(3, 5).is_complete());
    }
}

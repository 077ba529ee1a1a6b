use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::{EmployeeId, SessionId};
use crate::template::EmployerId;

pub type ExchangeId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeStatus {
    Pending,
    Approved,
    Denied,
}

impl std::fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeStatus::Pending => write!(f, "PENDING"),
            ExchangeStatus::Approved => write!(f, "APPROVED"),
            ExchangeStatus::Denied => write!(f, "DENIED"),
        }
    }
}

/// Request to hand an approved session over to another employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobExchange {
    pub id: ExchangeId,
    pub job_session_id: SessionId,
    pub from_employee_id: EmployeeId,
    /// `None` while the exchange is open to anyone.
    pub to_employee_id: Option<EmployeeId>,
    pub reason: String,
    pub status: ExchangeStatus,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<EmployerId>,
}

impl JobExchange {
    pub fn new(job_session_id: SessionId, from_employee_id: EmployeeId, reason: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_session_id,
            from_employee_id,
            to_employee_id: None,
            reason,
            status: ExchangeStatus::Pending,
            requested_at: Utc::now(),
            responded_at: None,
            decided_at: None,
            decided_by: None,
        }
    }

    /// Pending and nobody has responded yet.
    pub fn is_open(&self) -> bool {
        self.status == ExchangeStatus::Pending && self.to_employee_id.is_none()
    }
}

//! Persistence collaborator.
//!
//! The engine only needs plain reads, all-or-none batch writes, and
//! compare-and-set writes that report how many rows they touched. Any store offering
//! row-level conditional updates can implement [`SessionStore`];
//! [`MemoryStore`] is the in-process implementation.

pub mod memory;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::Result;
use crate::exchange::{ExchangeId, JobExchange};
use crate::session::{EmployeeId, Evaluation, JobSession, SessionId, SessionStatus};
use crate::template::{EmployerId, JobTemplate, TemplateId};

pub use memory::MemoryStore;

/// What a conditional session write does to `assigned_to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Assignment {
    #[default]
    Keep,
    Set(EmployeeId),
    Clear,
}

/// The WHERE clause of a conditional session write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGuard {
    /// Current status must be one of these.
    pub statuses: Vec<SessionStatus>,
    /// When set, the current assignee must match.
    pub assigned_to: Option<EmployeeId>,
}

impl SessionGuard {
    pub fn status(status: SessionStatus) -> Self {
        Self::any_of(&[status])
    }

    pub fn any_of(statuses: &[SessionStatus]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            assigned_to: None,
        }
    }

    pub fn held_by(mut self, employee_id: EmployeeId) -> Self {
        self.assigned_to = Some(employee_id);
        self
    }

    pub fn matches(&self, session: &JobSession) -> bool {
        self.statuses.contains(&session.status)
            && self
                .assigned_to
                .map_or(true, |employee| session.assigned_to == Some(employee))
    }
}

/// The SET clause of a conditional session write. `None` fields are left
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionChange {
    pub status: Option<SessionStatus>,
    pub assigned_to: Assignment,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub evaluation: Option<Evaluation>,
}

impl SessionChange {
    pub fn to(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn reassign(employee_id: EmployeeId) -> Self {
        Self {
            assigned_to: Assignment::Set(employee_id),
            ..Default::default()
        }
    }

    pub fn assign(mut self, assignment: Assignment) -> Self {
        self.assigned_to = assignment;
        self
    }

    pub fn started(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn completed(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn evaluated(mut self, evaluation: Evaluation) -> Self {
        self.evaluation = Some(evaluation);
        self
    }

    pub fn apply(self, session: &mut JobSession) {
        if let Some(status) = self.status {
            session.status = status;
        }
        match self.assigned_to {
            Assignment::Keep => {}
            Assignment::Set(employee) => session.assigned_to = Some(employee),
            Assignment::Clear => session.assigned_to = None,
        }
        if self.started_at.is_some() {
            session.started_at = self.started_at;
        }
        if self.completed_at.is_some() {
            session.completed_at = self.completed_at;
        }
        if self.evaluation.is_some() {
            session.evaluation = self.evaluation;
        }
    }
}

/// Optional filters for listing sessions. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub template_id: Option<TemplateId>,
    pub assigned_to: Option<EmployeeId>,
}

impl SessionFilter {
    pub fn with_status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn for_template(template_id: TemplateId) -> Self {
        Self {
            template_id: Some(template_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, session: &JobSession) -> bool {
        self.status.map_or(true, |s| session.status == s)
            && self.template_id.map_or(true, |t| session.template_id == t)
            && self
                .assigned_to
                .map_or(true, |e| session.assigned_to == Some(e))
    }
}

/// Outcome of [`SessionStore::replace_offered_sessions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// OFFERED sessions removed.
    pub withdrawn: usize,
    /// Sessions actually inserted, in the order given.
    pub issued: Vec<JobSession>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new template together with its first sessions, all or none.
    /// Fails with `TemplateExists` when the id is taken.
    async fn insert_template(
        &self,
        template: JobTemplate,
        sessions: Vec<JobSession>,
    ) -> Result<()>;

    async fn get_template(&self, id: TemplateId) -> Result<Option<JobTemplate>>;

    /// Delete a template together with its sessions and their exchanges.
    /// Fails with `TemplateInUse` while any of its sessions is live.
    /// Returns the number of sessions removed.
    async fn delete_template(&self, id: TemplateId) -> Result<usize>;

    /// Add sessions to a stored template, all or none, raising its
    /// `issued_sessions` to at least `issued_through`.
    async fn append_sessions(
        &self,
        template_id: TemplateId,
        sessions: Vec<JobSession>,
        issued_through: u32,
    ) -> Result<()>;

    /// In one write: store the edited template, withdraw its OFFERED sessions
    /// and insert `sessions`. Candidates dated on a day a kept session already
    /// covers are dropped. Nothing changes when the write fails.
    async fn replace_offered_sessions(
        &self,
        template: JobTemplate,
        sessions: Vec<JobSession>,
    ) -> Result<Replacement>;

    async fn get_session(&self, id: SessionId) -> Result<Option<JobSession>>;

    /// Sessions matching `filter`, ascending by date then code.
    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<JobSession>>;

    /// `UPDATE sessions SET <change> WHERE id = <id> AND <guard>`.
    /// Returns the affected row count (0 or 1).
    async fn update_session_if(
        &self,
        id: SessionId,
        guard: &SessionGuard,
        change: SessionChange,
    ) -> Result<usize>;

    /// Insert where the exchange's session matches `guard` and has no
    /// PENDING exchange yet. Returns the affected row count (0 or 1).
    async fn insert_exchange_if(
        &self,
        exchange: JobExchange,
        guard: &SessionGuard,
    ) -> Result<usize>;

    async fn get_exchange(&self, id: ExchangeId) -> Result<Option<JobExchange>>;

    /// Exchanges for a session, oldest first.
    async fn list_exchanges(&self, session_id: SessionId) -> Result<Vec<JobExchange>>;

    /// Set the responder where it is still NULL and the exchange is PENDING.
    async fn set_exchange_responder_if_open(
        &self,
        id: ExchangeId,
        employee_id: EmployeeId,
        at: DateTime<Utc>,
    ) -> Result<usize>;

    /// In one write: mark a PENDING exchange with a responder APPROVED and
    /// hand its session to the responder, provided the session matches
    /// `guard`. Returns the affected row count (0 or 1).
    async fn approve_exchange_if(
        &self,
        id: ExchangeId,
        guard: &SessionGuard,
        decided_by: EmployerId,
        at: DateTime<Utc>,
    ) -> Result<usize>;

    /// Mark the exchange DENIED where it is still PENDING.
    async fn deny_exchange_if_pending(
        &self,
        id: ExchangeId,
        decided_by: EmployerId,
        at: DateTime<Utc>,
    ) -> Result<usize>;

    async fn record_skip(&self, employee_id: EmployeeId, session_id: SessionId) -> Result<()>;

    async fn skipped_sessions(&self, employee_id: EmployeeId) -> Result<HashSet<SessionId>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn session(status: SessionStatus, assigned_to: Option<EmployeeId>) -> JobSession {
        let mut s = JobSession::offered(
            Uuid::new_v4(),
            "A001".to_string(),
            "J-A001".to_string(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
        );
        s.status = status;
        s.assigned_to = assigned_to;
        s
    }

    #[test]
    fn guard_checks_status_and_holder() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let claimed = session(SessionStatus::Claimed, Some(alice));

        assert!(SessionGuard::status(SessionStatus::Claimed).matches(&claimed));
        assert!(SessionGuard::status(SessionStatus::Claimed)
            .held_by(alice)
            .matches(&claimed));
        assert!(!SessionGuard::status(SessionStatus::Claimed)
            .held_by(bob)
            .matches(&claimed));
        assert!(!SessionGuard::status(SessionStatus::Offered).matches(&claimed));
    }

    #[test]
    fn change_leaves_unset_fields_alone() {
        let alice = Uuid::new_v4();
        let mut s = session(SessionStatus::Approved, Some(alice));
        let now = Utc::now();

        SessionChange::to(SessionStatus::InProgress)
            .started(now)
            .apply(&mut s);

        assert_eq!(s.status, SessionStatus::InProgress);
        assert_eq!(s.assigned_to, Some(alice));
        assert_eq!(s.started_at, Some(now));
        assert!(s.completed_at.is_none());
    }

    #[test]
    fn change_clears_assignment() {
        let mut s = session(SessionStatus::Claimed, Some(Uuid::new_v4()));
        SessionChange::to(SessionStatus::Offered)
            .assign(Assignment::Clear)
            .apply(&mut s);
        assert!(s.assigned_to.is_none());
    }

    #[test]
    fn filter_matches_all_fields() {
        let alice = Uuid::new_v4();
        let s = session(SessionStatus::Claimed, Some(alice));
        assert!(SessionFilter::default().matches(&s));
        assert!(SessionFilter::with_status(SessionStatus::Claimed).matches(&s));
        assert!(!SessionFilter::with_status(SessionStatus::Offered).matches(&s));
        assert!(SessionFilter::for_template(s.template_id).matches(&s));
        let by_other = SessionFilter {
            assigned_to: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(!by_other.matches(&s));
    }
}

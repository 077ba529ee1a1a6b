//! Session state machine.
//!
//! Every transition is a single conditional write against the store. The
//! session is only read afterwards, to return the new state or to explain
//! why zero rows were affected. There is no read-then-write window.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{EngineError, Result};
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::session::model::{
    ChecklistProgress, EmployeeId, Evaluation, JobSession, SessionId, SessionStatus,
};
use crate::store::{Assignment, SessionChange, SessionFilter, SessionGuard, SessionStore};
use crate::template::EmployerId;

/// Who is asking to release a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Employee(EmployeeId),
    Employer(EmployerId),
}

#[derive(Clone)]
pub struct SessionLifecycle {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
}

impl SessionLifecycle {
    pub fn new(store: Arc<dyn SessionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn get(&self, id: SessionId) -> Result<JobSession> {
        self.store
            .get_session(id)
            .await?
            .ok_or(EngineError::SessionNotFound(id))
    }

    /// OFFERED → CLAIMED. Losing the race returns `AlreadyTaken`; the caller
    /// should re-fetch rather than retry.
    pub async fn claim(&self, id: SessionId, employee_id: EmployeeId) -> Result<JobSession> {
        let rows = self
            .store
            .update_session_if(
                id,
                &SessionGuard::status(SessionStatus::Offered),
                SessionChange::to(SessionStatus::Claimed).assign(Assignment::Set(employee_id)),
            )
            .await?;

        if rows == 0 {
            let current = self.get(id).await?;
            tracing::warn!(
                session_id = %id,
                employee_id = %employee_id,
                current = %current.status,
                "Claim lost"
            );
            return Err(EngineError::AlreadyTaken { session_id: id });
        }

        let session = self.get(id).await?;
        tracing::info!(session_id = %id, employee_id = %employee_id, "Session claimed");
        if let Some(template) = self.store.get_template(session.template_id).await? {
            self.notifier.notify(Notification::new(
                template.employer_id,
                NotificationKind::SessionClaimed,
                id,
            ));
        }
        Ok(session)
    }

    /// CLAIMED → OFFERED. An employee may only release their own claim, so a
    /// stale client cannot undo somebody else's later claim.
    pub async fn release_claim(&self, id: SessionId, actor: Actor) -> Result<JobSession> {
        let mut guard = SessionGuard::status(SessionStatus::Claimed);
        if let Actor::Employee(employee_id) = actor {
            guard = guard.held_by(employee_id);
        }
        let change = SessionChange::to(SessionStatus::Offered).assign(Assignment::Clear);

        if self.store.update_session_if(id, &guard, change).await? == 0 {
            let current = self.get(id).await?;
            return Err(match actor {
                Actor::Employee(employee_id) if current.status == SessionStatus::Claimed => {
                    EngineError::NotAssignee {
                        session_id: id,
                        employee_id,
                    }
                }
                _ => invalid(&current, SessionStatus::Offered),
            });
        }

        tracing::info!(session_id = %id, actor = ?actor, "Claim released");
        self.get(id).await
    }

    /// CLAIMED → APPROVED.
    pub async fn approve(&self, id: SessionId) -> Result<JobSession> {
        let session = self
            .transition(
                id,
                SessionGuard::status(SessionStatus::Claimed),
                SessionChange::to(SessionStatus::Approved),
            )
            .await?;
        if let Some(assignee) = session.assigned_to {
            self.notifier.notify(Notification::new(
                assignee,
                NotificationKind::SessionApproved,
                id,
            ));
        }
        Ok(session)
    }

    /// CLAIMED → REFUSED. The note travels with the notification only.
    pub async fn refuse(&self, id: SessionId, note: Option<String>) -> Result<JobSession> {
        let session = self
            .transition(
                id,
                SessionGuard::status(SessionStatus::Claimed),
                SessionChange::to(SessionStatus::Refused),
            )
            .await?;
        if let Some(assignee) = session.assigned_to {
            let mut notification =
                Notification::new(assignee, NotificationKind::SessionRefused, id);
            notification.note = note;
            self.notifier.notify(notification);
        }
        Ok(session)
    }

    /// APPROVED → IN_PROGRESS. Idempotent: a session already in progress is
    /// returned as is and keeps its original `started_at`.
    pub async fn start(&self, id: SessionId) -> Result<JobSession> {
        let rows = self
            .store
            .update_session_if(
                id,
                &SessionGuard::status(SessionStatus::Approved),
                SessionChange::to(SessionStatus::InProgress).started(Utc::now()),
            )
            .await?;

        let session = self.get(id).await?;
        match (rows, session.status) {
            (1, _) => {
                tracing::info!(session_id = %id, "Session started");
                Ok(session)
            }
            (_, SessionStatus::InProgress) => Ok(session),
            _ => Err(invalid(&session, SessionStatus::InProgress)),
        }
    }

    /// IN_PROGRESS → COMPLETED, once every required checklist step is done.
    pub async fn complete(
        &self,
        id: SessionId,
        checklist: ChecklistProgress,
    ) -> Result<JobSession> {
        if !checklist.is_complete() {
            return Err(EngineError::ChecklistIncomplete {
                remaining: checklist.remaining(),
            });
        }
        self.transition(
            id,
            SessionGuard::status(SessionStatus::InProgress),
            SessionChange::to(SessionStatus::Completed).completed(Utc::now()),
        )
        .await
    }

    /// OFFERED, CLAIMED or APPROVED → CANCELLED. The last assignee is kept.
    pub async fn cancel(&self, id: SessionId) -> Result<JobSession> {
        self.transition(
            id,
            SessionGuard::any_of(&[
                SessionStatus::Offered,
                SessionStatus::Claimed,
                SessionStatus::Approved,
            ]),
            SessionChange::to(SessionStatus::Cancelled),
        )
        .await
    }

    /// COMPLETED → EVALUATED. Only one evaluation can ever attach.
    pub async fn evaluate(&self, id: SessionId, evaluation: Evaluation) -> Result<JobSession> {
        if !(1..=5).contains(&evaluation.rating) {
            return Err(EngineError::InvalidEvaluation(format!(
                "rating must be between 1 and 5, got {}",
                evaluation.rating
            )));
        }
        self.transition(
            id,
            SessionGuard::status(SessionStatus::Completed),
            SessionChange::to(SessionStatus::Evaluated).evaluated(evaluation),
        )
        .await
    }

    /// Hide an offered session from this employee's marketplace.
    pub async fn skip(&self, id: SessionId, employee_id: EmployeeId) -> Result<()> {
        self.store.record_skip(employee_id, id).await?;
        tracing::debug!(session_id = %id, employee_id = %employee_id, "Session skipped");
        Ok(())
    }

    /// OFFERED sessions this employee has not skipped, soonest first.
    pub async fn marketplace(&self, employee_id: EmployeeId) -> Result<Vec<JobSession>> {
        let skipped = self.store.skipped_sessions(employee_id).await?;
        let mut offered = self
            .store
            .list_sessions(&SessionFilter::with_status(SessionStatus::Offered))
            .await?;
        offered.retain(|s| !skipped.contains(&s.id));
        Ok(offered)
    }

    async fn transition(
        &self,
        id: SessionId,
        guard: SessionGuard,
        change: SessionChange,
    ) -> Result<JobSession> {
        let requested = change.status.unwrap_or(SessionStatus::Offered);
        let rows = self.store.update_session_if(id, &guard, change).await?;
        let session = self.get(id).await?;
        if rows == 0 {
            return Err(invalid(&session, requested));
        }
        tracing::info!(session_id = %id, status = %session.status, "Session transitioned");
        Ok(session)
    }
}

fn invalid(current: &JobSession, requested: SessionStatus) -> EngineError {
    EngineError::InvalidTransition {
        session_id: current.id,
        current: current.status,
        requested,
    }
}

impl std::fmt::Debug for SessionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLifecycle").finish_non_exhaustive()
    }
}


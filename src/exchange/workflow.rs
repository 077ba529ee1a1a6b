use std::sync::Arc;

use chrono::Utc;

use crate::error::{EngineError, Result};
use crate::exchange::model::{ExchangeId, ExchangeStatus, JobExchange};
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::session::{EmployeeId, SessionId, SessionStatus};
use crate::store::{SessionGuard, SessionStore};
use crate::template::EmployerId;

/// Hands approved sessions from one employee to another, subject to the
/// employer's decision.
#[derive(Clone)]
pub struct ExchangeWorkflow {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
}

impl ExchangeWorkflow {
    pub fn new(store: Arc<dyn SessionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn get(&self, id: ExchangeId) -> Result<JobExchange> {
        self.store
            .get_exchange(id)
            .await?
            .ok_or(EngineError::ExchangeNotFound(id))
    }

    pub async fn for_session(&self, session_id: SessionId) -> Result<Vec<JobExchange>> {
        self.store.list_exchanges(session_id).await
    }

    /// Offer an approved session up for exchange. Only its assignee may post,
    /// and only while no other exchange for it is pending. The session is
    /// checked in the same write that stores the exchange.
    pub async fn post(
        &self,
        session_id: SessionId,
        employee_id: EmployeeId,
        reason: String,
    ) -> Result<JobExchange> {
        let exchange = JobExchange::new(session_id, employee_id, reason);
        let guard = SessionGuard::status(SessionStatus::Approved).held_by(employee_id);
        let rows = self
            .store
            .insert_exchange_if(exchange.clone(), &guard)
            .await?;
        if rows == 0 {
            return Err(self.post_refused(session_id, employee_id).await);
        }

        tracing::info!(
            exchange_id = %exchange.id,
            session_id = %session_id,
            employee_id = %employee_id,
            "Exchange posted"
        );
        Ok(exchange)
    }

    /// Re-read the session after a refused post to name the reason.
    async fn post_refused(&self, session_id: SessionId, employee_id: EmployeeId) -> EngineError {
        let session = match self.store.get_session(session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => return EngineError::SessionNotFound(session_id),
            Err(e) => return e,
        };
        if session.status != SessionStatus::Approved {
            EngineError::InvalidTransition {
                session_id,
                current: session.status,
                requested: SessionStatus::Approved,
            }
        } else if !session.is_assigned_to(employee_id) {
            EngineError::NotAssignee {
                session_id,
                employee_id,
            }
        } else {
            EngineError::ExchangePending(session_id)
        }
    }

    /// Volunteer to take the session. The first responder wins; everyone
    /// after gets `ExchangeTaken`.
    pub async fn respond(&self, id: ExchangeId, employee_id: EmployeeId) -> Result<JobExchange> {
        let exchange = self.get(id).await?;
        if exchange.from_employee_id == employee_id {
            return Err(EngineError::InvalidDecision(
                "an employee cannot respond to their own exchange".to_string(),
            ));
        }

        let rows = self
            .store
            .set_exchange_responder_if_open(id, employee_id, Utc::now())
            .await?;
        if rows == 0 {
            tracing::warn!(
                exchange_id = %id,
                employee_id = %employee_id,
                "Exchange response lost"
            );
            return Err(EngineError::ExchangeTaken { exchange_id: id });
        }

        tracing::info!(exchange_id = %id, employee_id = %employee_id, "Exchange answered");
        self.get(id).await
    }

    /// Approve or deny a pending exchange.
    ///
    /// Approval moves the session to the responder; the session stays
    /// APPROVED. The exchange decision and the reassignment are one write,
    /// so either both happen or neither does. Approving with no responder is
    /// rejected before any write.
    pub async fn decide(
        &self,
        id: ExchangeId,
        employer_id: EmployerId,
        approve: bool,
    ) -> Result<JobExchange> {
        let exchange = self.get(id).await?;
        if exchange.status != ExchangeStatus::Pending {
            return Err(already_decided(exchange.status));
        }

        let status = if approve {
            if exchange.to_employee_id.is_none() {
                return Err(EngineError::InvalidDecision(
                    "no employee has responded to this exchange".to_string(),
                ));
            }
            let guard =
                SessionGuard::status(SessionStatus::Approved).held_by(exchange.from_employee_id);
            let rows = self
                .store
                .approve_exchange_if(id, &guard, employer_id, Utc::now())
                .await?;
            if rows == 0 {
                return Err(self.approval_refused(id).await);
            }
            ExchangeStatus::Approved
        } else {
            let rows = self
                .store
                .deny_exchange_if_pending(id, employer_id, Utc::now())
                .await?;
            if rows == 0 {
                return Err(self.approval_refused(id).await);
            }
            ExchangeStatus::Denied
        };

        tracing::info!(
            exchange_id = %id,
            session_id = %exchange.job_session_id,
            decision = %status,
            "Exchange decided"
        );

        let decided = self.get(id).await?;
        let kind = if approve {
            NotificationKind::ExchangeApproved
        } else {
            NotificationKind::ExchangeDenied
        };
        let recipients = std::iter::once(decided.from_employee_id).chain(decided.to_employee_id);
        for recipient in recipients {
            self.notifier
                .notify(Notification::new(recipient, kind, decided.job_session_id));
        }
        Ok(decided)
    }

    /// Re-read the exchange after a refused decision to name the reason.
    async fn approval_refused(&self, id: ExchangeId) -> EngineError {
        match self.get(id).await {
            Ok(exchange) if exchange.status != ExchangeStatus::Pending => {
                already_decided(exchange.status)
            }
            Ok(_) => EngineError::InvalidDecision(
                "session is no longer approved for the posting employee".to_string(),
            ),
            Err(e) => e,
        }
    }
}

fn already_decided(status: ExchangeStatus) -> EngineError {
    tracing::warn!(%status, "Exchange decision lost");
    EngineError::InvalidDecision(format!("exchange is already {status}"))
}

impl std::fmt::Debug for ExchangeWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeWorkflow").finish_non_exhaustive()
    }
}

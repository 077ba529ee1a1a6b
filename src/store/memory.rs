use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::config::StoreConfig;
use crate::error::{EngineError, Result};
use crate::exchange::{ExchangeId, ExchangeStatus, JobExchange};
use crate::session::{EmployeeId, JobSession, SessionId, SessionStatus};
use crate::store::{Replacement, SessionChange, SessionFilter, SessionGuard, SessionStore};
use crate::template::{EmployerId, JobTemplate, TemplateId};

/// In-process store. Every conditional write runs under one write guard,
/// so the check and the update are atomic with respect to other callers.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    templates: HashMap<TemplateId, JobTemplate>,
    sessions: HashMap<SessionId, JobSession>,
    exchanges: HashMap<ExchangeId, JobExchange>,
    skips: HashMap<EmployeeId, HashMap<SessionId, DateTime<Utc>>>,
    max_sessions: usize,
    max_exchanges: usize,
}

impl StoreState {
    /// Fails with `StoreFull` unless `adding` sessions fit once `removing`
    /// are gone.
    fn ensure_room(&self, adding: usize, removing: usize) -> Result<()> {
        if self.sessions.len() - removing + adding > self.max_sessions {
            return Err(EngineError::StoreFull(self.max_sessions));
        }
        Ok(())
    }

    /// Drop sessions along with their exchanges and skip records.
    fn remove_sessions(&mut self, removed: &HashSet<SessionId>) {
        self.sessions.retain(|sid, _| !removed.contains(sid));
        self.exchanges
            .retain(|_, e| !removed.contains(&e.job_session_id));
        for skipped in self.skips.values_mut() {
            skipped.retain(|sid, _| !removed.contains(sid));
        }
        self.skips.retain(|_, skipped| !skipped.is_empty());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(&StoreConfig::default())
    }

    pub fn with_config(config: &StoreConfig) -> Self {
        Self {
            state: RwLock::new(StoreState {
                max_sessions: config.max_sessions,
                max_exchanges: config.max_exchanges,
                ..Default::default()
            }),
        }
    }

    /// Put a session in place as-is, bypassing the lifecycle. Used to seed
    /// fixtures in tests and imports.
    pub async fn put_session(&self, session: JobSession) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.sessions.contains_key(&session.id) && state.sessions.len() >= state.max_sessions {
            return Err(EngineError::StoreFull(state.max_sessions));
        }
        state.sessions.insert(session.id, session);
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_template(
        &self,
        template: JobTemplate,
        sessions: Vec<JobSession>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if state.templates.contains_key(&template.id) {
            return Err(EngineError::TemplateExists(template.id));
        }
        state.ensure_room(sessions.len(), 0)?;
        for session in sessions {
            state.sessions.insert(session.id, session);
        }
        state.templates.insert(template.id, template);
        Ok(())
    }

    async fn get_template(&self, id: TemplateId) -> Result<Option<JobTemplate>> {
        Ok(self.state.read().await.templates.get(&id).cloned())
    }

    async fn delete_template(&self, id: TemplateId) -> Result<usize> {
        let mut state = self.state.write().await;
        if !state.templates.contains_key(&id) {
            return Err(EngineError::TemplateNotFound(id));
        }
        if state
            .sessions
            .values()
            .any(|s| s.template_id == id && s.status.is_live())
        {
            return Err(EngineError::TemplateInUse(id));
        }

        let removed: HashSet<SessionId> = state
            .sessions
            .values()
            .filter(|s| s.template_id == id)
            .map(|s| s.id)
            .collect();
        state.remove_sessions(&removed);
        state.templates.remove(&id);
        Ok(removed.len())
    }

    async fn append_sessions(
        &self,
        template_id: TemplateId,
        sessions: Vec<JobSession>,
        issued_through: u32,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.templates.contains_key(&template_id) {
            return Err(EngineError::TemplateNotFound(template_id));
        }
        state.ensure_room(sessions.len(), 0)?;
        for session in sessions {
            state.sessions.insert(session.id, session);
        }
        if let Some(template) = state.templates.get_mut(&template_id) {
            template.issued_sessions = template.issued_sessions.max(issued_through);
        }
        Ok(())
    }

    async fn replace_offered_sessions(
        &self,
        mut template: JobTemplate,
        sessions: Vec<JobSession>,
    ) -> Result<Replacement> {
        let mut state = self.state.write().await;
        let stored = state
            .templates
            .get(&template.id)
            .ok_or(EngineError::TemplateNotFound(template.id))?;
        template.issued_sessions = template.issued_sessions.max(stored.issued_sessions);
        template.created_at = stored.created_at;

        let mut withdrawn = HashSet::new();
        let mut covered = HashSet::new();
        for s in state.sessions.values().filter(|s| s.template_id == template.id) {
            if s.status == SessionStatus::Offered {
                withdrawn.insert(s.id);
            } else {
                covered.insert(s.scheduled_date);
            }
        }
        let issued: Vec<JobSession> = sessions
            .into_iter()
            .filter(|s| !covered.contains(&s.scheduled_date))
            .collect();
        state.ensure_room(issued.len(), withdrawn.len())?;

        state.remove_sessions(&withdrawn);
        for session in &issued {
            state.sessions.insert(session.id, session.clone());
        }
        state.templates.insert(template.id, template);
        Ok(Replacement {
            withdrawn: withdrawn.len(),
            issued,
        })
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<JobSession>> {
        Ok(self.state.read().await.sessions.get(&id).cloned())
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<JobSession>> {
        let state = self.state.read().await;
        let mut sessions: Vec<JobSession> = state
            .sessions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| {
            a.scheduled_date
                .cmp(&b.scheduled_date)
                .then_with(|| a.full_job_code.cmp(&b.full_job_code))
        });
        Ok(sessions)
    }

    async fn update_session_if(
        &self,
        id: SessionId,
        guard: &SessionGuard,
        change: SessionChange,
    ) -> Result<usize> {
        let mut state = self.state.write().await;
        match state.sessions.get_mut(&id) {
            Some(session) if guard.matches(session) => {
                change.apply(session);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn insert_exchange_if(
        &self,
        exchange: JobExchange,
        guard: &SessionGuard,
    ) -> Result<usize> {
        let mut state = self.state.write().await;
        let session_ok = state
            .sessions
            .get(&exchange.job_session_id)
            .is_some_and(|s| guard.matches(s));
        let pending = state.exchanges.values().any(|e| {
            e.job_session_id == exchange.job_session_id && e.status == ExchangeStatus::Pending
        });
        if !session_ok || pending {
            return Ok(0);
        }
        if state.exchanges.len() >= state.max_exchanges {
            return Err(EngineError::StoreFull(state.max_exchanges));
        }
        state.exchanges.insert(exchange.id, exchange);
        Ok(1)
    }

    async fn get_exchange(&self, id: ExchangeId) -> Result<Option<JobExchange>> {
        Ok(self.state.read().await.exchanges.get(&id).cloned())
    }

    async fn list_exchanges(&self, session_id: SessionId) -> Result<Vec<JobExchange>> {
        let state = self.state.read().await;
        let mut exchanges: Vec<JobExchange> = state
            .exchanges
            .values()
            .filter(|e| e.job_session_id == session_id)
            .cloned()
            .collect();
        exchanges.sort_by_key(|e| e.requested_at);
        Ok(exchanges)
    }

    async fn set_exchange_responder_if_open(
        &self,
        id: ExchangeId,
        employee_id: EmployeeId,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut state = self.state.write().await;
        match state.exchanges.get_mut(&id) {
            Some(exchange) if exchange.is_open() => {
                exchange.to_employee_id = Some(employee_id);
                exchange.responded_at = Some(at);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn approve_exchange_if(
        &self,
        id: ExchangeId,
        guard: &SessionGuard,
        decided_by: EmployerId,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut state = self.state.write().await;
        let state = &mut *state;
        let Some(exchange) = state.exchanges.get_mut(&id) else {
            return Ok(0);
        };
        let (ExchangeStatus::Pending, Some(to_employee)) =
            (exchange.status, exchange.to_employee_id)
        else {
            return Ok(0);
        };
        match state.sessions.get_mut(&exchange.job_session_id) {
            Some(session) if guard.matches(session) => {
                SessionChange::reassign(to_employee).apply(session);
                exchange.status = ExchangeStatus::Approved;
                exchange.decided_by = Some(decided_by);
                exchange.decided_at = Some(at);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn deny_exchange_if_pending(
        &self,
        id: ExchangeId,
        decided_by: EmployerId,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut state = self.state.write().await;
        match state.exchanges.get_mut(&id) {
            Some(exchange) if exchange.status == ExchangeStatus::Pending => {
                exchange.status = ExchangeStatus::Denied;
                exchange.decided_by = Some(decided_by);
                exchange.decided_at = Some(at);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn record_skip(&self, employee_id: EmployeeId, session_id: SessionId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.sessions.contains_key(&session_id) {
            return Err(EngineError::SessionNotFound(session_id));
        }
        state
            .skips
            .entry(employee_id)
            .or_default()
            .entry(session_id)
            .or_insert_with(Utc::now);
        Ok(())
    }

    async fn skipped_sessions(&self, employee_id: EmployeeId) -> Result<HashSet<SessionId>> {
        Ok(self
            .state
            .read()
            .await
            .skips
            .get(&employee_id)
            .map(|s| s.keys().copied().collect())
            .unwrap_or_default())
    }
}

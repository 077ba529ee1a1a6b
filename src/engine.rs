use std::collections::HashSet;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::exchange::{ExchangeId, ExchangeWorkflow, JobExchange};
use crate::notify::{Notifier, TracingNotifier};
use crate::schedule::{self, SessionDate};
use crate::session::{
    Actor, ChecklistProgress, EmployeeId, Evaluation, JobSession, SessionFactory, SessionId,
    SessionLifecycle, SessionStatus,
};
use crate::store::{MemoryStore, SessionFilter, SessionStore};
use crate::template::{EmployerId, JobTemplate, TemplateId};

/// Entry point for callers: wires generation, the session lifecycle and the
/// exchange workflow to one store and one notifier.
pub struct Engine {
    pub config: EngineConfig,
    store: Arc<dyn SessionStore>,
    factory: SessionFactory,
    lifecycle: SessionLifecycle,
    exchanges: ExchangeWorkflow,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            factory: SessionFactory::new(config.code_numbering),
            lifecycle: SessionLifecycle::new(store.clone(), notifier.clone()),
            exchanges: ExchangeWorkflow::new(store.clone(), notifier),
            store,
            config,
        }
    }

    /// Engine over a fresh [`MemoryStore`] that logs notifications.
    pub fn in_memory(config: EngineConfig) -> Self {
        let store = Arc::new(MemoryStore::with_config(&config.store));
        Self::new(config, store, Arc::new(TracingNotifier))
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    // ---- Templates and generation ----

    /// Sessions the template would produce, numbered from `first_counter`.
    /// Nothing is stored.
    pub fn preview_sessions(
        &self,
        template: &JobTemplate,
        first_counter: u32,
    ) -> Result<Vec<JobSession>> {
        let dates = schedule::generate(&template.window_spec()?);
        Ok(self.factory.build(template, &dates, first_counter))
    }

    /// Store a new template and materialize its sessions. Either both land or
    /// neither does; an id already in use fails with `TemplateExists`.
    pub async fn create_template(&self, template: JobTemplate) -> Result<Vec<JobSession>> {
        let dates = schedule::generate(&template.window_spec()?);
        let (template, sessions) = self.build(template, &dates);
        self.store.insert_template(template.clone(), sessions.clone()).await?;
        self.log_issued(&template, sessions.len());
        Ok(sessions)
    }

    /// Materialize sessions for a stored template. The template itself is
    /// unchanged apart from its issued-session counter.
    pub async fn generate_sessions(&self, template_id: TemplateId) -> Result<Vec<JobSession>> {
        let template = self.template(template_id).await?;
        let dates = schedule::generate(&template.window_spec()?);
        let (template, sessions) = self.build(template, &dates);
        if sessions.is_empty() {
            return Ok(sessions);
        }
        self.store
            .append_sessions(template.id, sessions.clone(), template.issued_sessions)
            .await?;
        self.log_issued(&template, sessions.len());
        Ok(sessions)
    }

    /// Apply an edited template: sessions still OFFERED are withdrawn and
    /// reissued; every other session is kept, and no new session is issued
    /// for a date a kept session already covers. On failure nothing changes.
    pub async fn regenerate_sessions(&self, edited: JobTemplate) -> Result<Vec<JobSession>> {
        let spec = edited.window_spec()?;
        let stored = self.template(edited.id).await?;
        let template = JobTemplate {
            issued_sessions: stored.issued_sessions,
            created_at: stored.created_at,
            ..edited
        };

        // Advisory only: the store re-checks coverage under its own lock.
        let covered: HashSet<_> = self
            .store
            .list_sessions(&SessionFilter::for_template(template.id))
            .await?
            .into_iter()
            .filter(|s| s.status != SessionStatus::Offered)
            .map(|s| s.scheduled_date)
            .collect();
        let dates: Vec<SessionDate> = schedule::generate(&spec)
            .into_iter()
            .filter(|d| !covered.contains(&d.scheduled_date))
            .collect();

        let (template, sessions) = self.build(template, &dates);
        let replacement = self
            .store
            .replace_offered_sessions(template.clone(), sessions)
            .await?;

        tracing::info!(
            template_id = %template.id,
            withdrawn = replacement.withdrawn,
            kept = covered.len(),
            "Regenerating sessions"
        );
        self.log_issued(&template, replacement.issued.len());
        Ok(replacement.issued)
    }

    /// Delete a template and its remaining sessions. Refused while any of its
    /// sessions is live.
    pub async fn delete_template(&self, id: TemplateId) -> Result<usize> {
        let removed = self.store.delete_template(id).await?;
        tracing::info!(template_id = %id, removed, "Template deleted");
        Ok(removed)
    }

    pub async fn template(&self, id: TemplateId) -> Result<JobTemplate> {
        self.store
            .get_template(id)
            .await?
            .ok_or(EngineError::TemplateNotFound(id))
    }

    /// Number sessions for `dates` and advance the template's issued-session
    /// high-water mark to the last counter used.
    fn build(
        &self,
        mut template: JobTemplate,
        dates: &[SessionDate],
    ) -> (JobTemplate, Vec<JobSession>) {
        let first = self.factory.first_counter(&template);
        let sessions = self.factory.build(&template, dates, first);
        if !sessions.is_empty() {
            let last = first.saturating_add(sessions.len() as u32 - 1);
            template.issued_sessions = template.issued_sessions.max(last);
        }
        (template, sessions)
    }

    fn log_issued(&self, template: &JobTemplate, count: usize) {
        tracing::info!(
            template_id = %template.id,
            job_code = %template.job_code,
            count,
            numbering = %self.factory.numbering(),
            "Sessions generated"
        );
    }

    // ---- Sessions ----

    pub async fn session(&self, id: SessionId) -> Result<JobSession> {
        self.lifecycle.get(id).await
    }

    pub async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<JobSession>> {
        self.store.list_sessions(filter).await
    }

    pub async fn claim_session(
        &self,
        id: SessionId,
        employee_id: EmployeeId,
    ) -> Result<JobSession> {
        self.lifecycle.claim(id, employee_id).await
    }

    pub async fn release_claim(&self, id: SessionId, actor: Actor) -> Result<JobSession> {
        self.lifecycle.release_claim(id, actor).await
    }

    pub async fn approve_session(&self, id: SessionId) -> Result<JobSession> {
        self.lifecycle.approve(id).await
    }

    pub async fn refuse_session(
        &self,
        id: SessionId,
        note: Option<String>,
    ) -> Result<JobSession> {
        self.lifecycle.refuse(id, note).await
    }

    pub async fn start_session(&self, id: SessionId) -> Result<JobSession> {
        self.lifecycle.start(id).await
    }

    pub async fn complete_session(
        &self,
        id: SessionId,
        checklist: ChecklistProgress,
    ) -> Result<JobSession> {
        self.lifecycle.complete(id, checklist).await
    }

    pub async fn cancel_session(&self, id: SessionId) -> Result<JobSession> {
        self.lifecycle.cancel(id).await
    }

    pub async fn evaluate_session(
        &self,
        id: SessionId,
        evaluation: Evaluation,
    ) -> Result<JobSession> {
        self.lifecycle.evaluate(id, evaluation).await
    }

    pub async fn skip_session(&self, id: SessionId, employee_id: EmployeeId) -> Result<()> {
        self.lifecycle.skip(id, employee_id).await
    }

    pub async fn marketplace(&self, employee_id: EmployeeId) -> Result<Vec<JobSession>> {
        self.lifecycle.marketplace(employee_id).await
    }

    // ---- Exchanges ----

    pub async fn post_exchange(
        &self,
        session_id: SessionId,
        employee_id: EmployeeId,
        reason: String,
    ) -> Result<JobExchange> {
        self.exchanges.post(session_id, employee_id, reason).await
    }

    pub async fn respond_to_exchange(
        &self,
        id: ExchangeId,
        employee_id: EmployeeId,
    ) -> Result<JobExchange> {
        self.exchanges.respond(id, employee_id).await
    }

    pub async fn decide_exchange(
        &self,
        id: ExchangeId,
        employer_id: EmployerId,
        approve: bool,
    ) -> Result<JobExchange> {
        self.exchanges.decide(id, employer_id, approve).await
    }

    pub async fn exchange(&self, id: ExchangeId) -> Result<JobExchange> {
        self.exchanges.get(id).await
    }

    pub async fn exchanges_for_session(&self, session_id: SessionId) -> Result<Vec<JobExchange>> {
        self.exchanges.for_session(session_id).await
    }
}

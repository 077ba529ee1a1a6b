use thiserror::Error;
use uuid::Uuid;

use crate::session::SessionStatus;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid window spec: {0}")]
    InvalidWindowSpec(String),

    #[error("Session {session_id} is no longer available")]
    AlreadyTaken { session_id: Uuid },

    #[error("Exchange {exchange_id} already has a responder")]
    ExchangeTaken { exchange_id: Uuid },

    #[error("Session {session_id} cannot move from {current} to {requested}")]
    InvalidTransition {
        session_id: Uuid,
        current: SessionStatus,
        requested: SessionStatus,
    },

    #[error("Invalid exchange decision: {0}")]
    InvalidDecision(String),

    #[error("Checklist incomplete: {remaining} required step(s) remaining")]
    ChecklistIncomplete { remaining: u32 },

    #[error("Invalid evaluation: {0}")]
    InvalidEvaluation(String),

    #[error("Employee {employee_id} is not assigned to session {session_id}")]
    NotAssignee { session_id: Uuid, employee_id: Uuid },

    #[error("Session {0} already has a pending exchange")]
    ExchangePending(Uuid),

    #[error("Template {0} still has live sessions")]
    TemplateInUse(Uuid),

    #[error("Template already exists: {0}")]
    TemplateExists(Uuid),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Template not found: {0}")]
    TemplateNotFound(Uuid),

    #[error("Exchange not found: {0}")]
    ExchangeNotFound(Uuid),

    #[error("Store is at capacity ({0} sessions)")]
    StoreFull(usize),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Stable machine-readable code, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidWindowSpec(_) => "invalid_window_spec",
            EngineError::AlreadyTaken { .. } | EngineError::ExchangeTaken { .. } => {
                "already_taken"
            }
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::InvalidDecision(_) => "invalid_decision",
            EngineError::ChecklistIncomplete { .. } => "checklist_incomplete",
            EngineError::InvalidEvaluation(_) => "invalid_evaluation",
            EngineError::NotAssignee { .. } => "not_assignee",
            EngineError::ExchangePending(_) => "exchange_pending",
            EngineError::TemplateInUse(_) => "template_in_use",
            EngineError::TemplateExists(_) => "template_exists",
            EngineError::SessionNotFound(_) => "session_not_found",
            EngineError::TemplateNotFound(_) => "template_not_found",
            EngineError::ExchangeNotFound(_) => "exchange_not_found",
            EngineError::StoreFull(_) => "store_full",
            EngineError::Serialization(_) => "serialization",
            EngineError::Io(_) => "io",
        }
    }

    /// True for a lost race, which callers answer by re-fetching.
    pub fn is_already_taken(&self) -> bool {
        matches!(
            self,
            EngineError::AlreadyTaken { .. } | EngineError::ExchangeTaken { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

use serde::{Deserialize, Serialize};

use crate::schedule::SessionDate;
use crate::session::model::JobSession;
use crate::template::JobTemplate;

const SESSION_CODE_PREFIX: char = 'A';

/// How session counters are chosen when a template is generated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeNumbering {
    /// Every generation numbers from 1. Codes can repeat codes of sessions
    /// kept from an earlier generation.
    #[default]
    Restart,
    /// Numbering continues after the template's highest issued counter.
    Continue,
}

impl std::fmt::Display for CodeNumbering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeNumbering::Restart => write!(f, "restart"),
            CodeNumbering::Continue => write!(f, "continue"),
        }
    }
}

/// `A001`, `A002`, ... Counters past 999 widen instead of wrapping.
pub fn session_code(counter: u32) -> String {
    format!("{}{:03}", SESSION_CODE_PREFIX, counter)
}

pub fn parse_session_code(code: &str) -> Option<u32> {
    let digits = code.strip_prefix(SESSION_CODE_PREFIX)?;
    if digits.len() < 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

pub fn full_job_code(job_code: &str, session_code: &str) -> String {
    format!("{}-{}", job_code, session_code)
}

/// Turns generated dates into OFFERED sessions with sequential codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionFactory {
    numbering: CodeNumbering,
}

impl SessionFactory {
    pub fn new(numbering: CodeNumbering) -> Self {
        Self { numbering }
    }

    pub fn numbering(&self) -> CodeNumbering {
        self.numbering
    }

    /// Counter of the first session produced by the next generation.
    pub fn first_counter(&self, template: &JobTemplate) -> u32 {
        match self.numbering {
            CodeNumbering::Restart => 1,
            CodeNumbering::Continue => template.issued_sessions.saturating_add(1),
        }
    }

    /// Build sessions in the order `dates` were emitted, numbering from
    /// `first_counter`.
    pub fn build(
        &self,
        template: &JobTemplate,
        dates: &[SessionDate],
        first_counter: u32,
    ) -> Vec<JobSession> {
        dates
            .iter()
            .zip(first_counter..)
            .map(|(date, counter)| {
                let code = session_code(counter);
                let mut session = JobSession::offered(
                    template.id,
                    code.clone(),
                    full_job_code(&template.job_code, &code),
                    date.scheduled_date,
                );
                session.scheduled_end_date = date.scheduled_end_date;
                session.scheduled_time = date.scheduled_time;
                session
            })
            .collect()
    }
}

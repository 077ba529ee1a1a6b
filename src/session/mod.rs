pub mod factory;
pub mod lifecycle;
pub mod model;

pub use factory::{full_job_code, parse_session_code, session_code, CodeNumbering, SessionFactory};
pub use lifecycle::{Actor, SessionLifecycle};
pub use model::{
    ChecklistProgress, EmployeeId, Evaluation, JobSession, SessionId, SessionStatus,
};

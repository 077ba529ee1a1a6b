pub mod model;
pub mod workflow;

pub use model::{ExchangeId, ExchangeStatus, JobExchange};
pub use workflow::ExchangeWorkflow;

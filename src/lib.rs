pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod notify;
pub mod schedule;
pub mod session;
pub mod shutdown;
pub mod store;
pub mod template;

pub use engine::Engine;
pub use error::{EngineError, Result};

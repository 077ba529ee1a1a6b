use std::net::SocketAddr;

use crate::session::CodeNumbering;

const DEFAULT_MAX_SESSIONS: usize = 100_000;
const DEFAULT_MAX_EXCHANGES: usize = 10_000;

/// Capacity limits for the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Maximum number of sessions held at once
    pub max_sessions: usize,
    /// Maximum number of exchanges held at once
    pub max_exchanges: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_exchanges: DEFAULT_MAX_EXCHANGES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Address the HTTP API listens on
    pub listen_addr: SocketAddr,
    /// Session counter strategy used when a template is generated again.
    /// `Restart` numbers every generation from A001.
    pub code_numbering: CodeNumbering,
    pub store: StoreConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // SAFETY: This is a hardcoded valid address that will always parse
            listen_addr: "127.0.0.1:8080"
                .parse()
                .expect("default listen address is valid"),
            code_numbering: CodeNumbering::Restart,
            store: StoreConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_code_numbering(mut self, numbering: CodeNumbering) -> Self {
        self.code_numbering = numbering;
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.store.max_sessions = max_sessions;
        self
    }
}

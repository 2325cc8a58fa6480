//! Error types for gm-guide-core

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// No engine binary was found at any of the searched locations.
    #[error("no engine binary found (searched bundled resources, application directory, PATH)")]
    NotFound,

    /// The engine process could not be started.
    #[error("failed to start engine: {0}")]
    Spawn(String),

    /// A pipe read or write failed.
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine process terminated unexpectedly.
    #[error("engine process exited")]
    EngineExited,

    /// The UCI handshake was malformed or timed out.
    #[error("UCI handshake failed: {0}")]
    Handshake(String),

    /// The session is not in the Ready state (not started, closed, or no
    /// engine available at all).
    #[error("engine is not ready")]
    NotReady,

    /// An analysis is already in flight and the session rejects queueing.
    #[error("an analysis is already in flight")]
    Busy,

    /// A bounded wait elapsed without the engine responding.
    #[error("engine did not respond within {0:?}")]
    Timeout(Duration),

    /// The request was stopped at the caller's demand.
    #[error("analysis cancelled")]
    Cancelled,

    /// The request carried no usable stop condition.
    #[error("invalid analysis request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, Error>;

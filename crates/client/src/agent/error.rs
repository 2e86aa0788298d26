//! Cache agent error types.

use crawlgate_core::Error;

/// Errors surfaced by the offline cache agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The network failed and there was no cached response to fall back to.
    #[error("network request for {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: Error,
    },

    /// A manifest resource could not be fetched or is not cacheable.
    #[error("install failed for {path}: {reason}")]
    Install { path: String, reason: String },

    /// `activate` was called before a successful `install`.
    #[error("agent is not installed")]
    NotInstalled,

    /// Cache storage failed during install or activation.
    #[error("cache storage failed: {0}")]
    Storage(#[from] Error),

    /// The spawned fetch task panicked or was cancelled.
    #[error("fetch task failed: {0}")]
    Task(String),
}

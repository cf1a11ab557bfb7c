use thiserror::Error;

/// Errors raised by the simulation core.
///
/// Everything above the core works with `anyhow::Result`; these convert through `?`
/// and can be recovered with `downcast_ref`.
#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    /// Parameters that cannot produce a valid catalog or arena.
    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    /// No collision-free initial position was found for an agent.
    #[error("failed to place agent {agent} after {attempts} attempts")]
    Placement { agent: usize, attempts: usize },
}

impl SimError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

//! Errors surfaced by the engine to whoever exposes it.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Credential did not match the required secret. Nothing was mutated.
    #[error("Unauthorized: invalid {0}")]
    Unauthorized(&'static str),

    #[error("Engine not started")]
    NotStarted,
}

pub type Result<T> = std::result::Result<T, EngineError>;

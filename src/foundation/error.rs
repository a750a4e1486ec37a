/// Crate-wide result alias.
pub type TemporaResult<T> = Result<T, TemporaError>;

/// Errors surfaced by compilation, scheduling and evaluation.
///
/// Recoverable conditions (unresolvable bindings, missing sub-sequence assets, stale compiled
/// data) never reach this type: they are logged and evaluated as empty.
#[derive(thiserror::Error, Debug)]
pub enum TemporaError {
    /// Invalid input data or options.
    #[error("validation error: {0}")]
    Validation(String),

    /// Corrupt compilation product (dangling parent, malformed hierarchy).
    #[error("compile error: {0}")]
    Compile(String),

    /// API misuse detected at runtime (cyclic system graph, unregistered component type).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A nested evaluation was rejected because no re-entrancy window is open.
    #[error("re-entrancy rejected: {0}")]
    Reentrancy(String),

    /// An iteration guard was exceeded (likely an infinite requeue or fence loop).
    #[error("runaway loop: {0}")]
    RunawayLoop(String),

    /// Model (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Foreign error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TemporaError {
    /// Build a [`TemporaError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`TemporaError::Compile`].
    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }

    /// Build a [`TemporaError::Precondition`].
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Build a [`TemporaError::Reentrancy`].
    pub fn reentrancy(msg: impl Into<String>) -> Self {
        Self::Reentrancy(msg.into())
    }

    /// Build a [`TemporaError::RunawayLoop`].
    pub fn runaway(msg: impl Into<String>) -> Self {
        Self::RunawayLoop(msg.into())
    }

    /// Build a [`TemporaError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for TemporaError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;

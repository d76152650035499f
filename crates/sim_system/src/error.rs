//! Scheduler error types.

/// Which lifecycle hook of a system failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Initialize,
    Update,
    Shutdown,
}

impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Initialize => "initialize",
            Self::Update => "update",
            Self::Shutdown => "shutdown",
        })
    }
}

/// Errors raised by the [`SystemManager`](crate::SystemManager).
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// A system with this id is already registered.
    #[error("system '{0}' is already registered")]
    Duplicate(String),

    /// `update` was called with a negative (or NaN) delta.
    #[error("deltaTime must be a non-negative number, got {0}")]
    NegativeDelta(f64),

    /// A system hook returned an error.
    #[error("system '{id}' failed during {phase}: {source}")]
    Hook {
        id: String,
        phase: HookPhase,
        #[source]
        source: anyhow::Error,
    },
}

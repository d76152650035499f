//! Player-layer error types.

use std::any::Any;

use sim_bus::BusError;
use sim_ecs::EcsError;
use sim_system::SystemError;

use crate::resolver::ResolveError;

/// Errors raised while driving a player or handling a command.
///
/// The `Display` text of every variant is what ends up in the `detail` of an
/// error acknowledgement.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// Entity or component storage rejected an operation.
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// The scheduler rejected an operation or a system hook failed.
    #[error(transparent)]
    System(#[from] SystemError),

    /// Publishing to a bus failed.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// A system reference could not be turned into a system.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// No handler is registered for the inbound message type.
    #[error("Unsupported message type: {0}")]
    UnsupportedMessage(String),

    /// A handler for this message type is already registered.
    #[error("handler for message type '{0}' is already registered")]
    DuplicateHandler(String),

    /// A message handler ran without producing an acknowledgement.
    #[error("message handler for '{0}' produced no acknowledgement")]
    NoAcknowledgement(String),

    /// The command payload does not have the expected shape.
    #[error("invalid '{kind}' payload: {reason}")]
    InvalidPayload { kind: String, reason: String },

    /// The player configuration is unusable.
    #[error("invalid player configuration: {0}")]
    Config(String),

    /// A system, operation or subscriber panicked. The player keeps running.
    #[error("panicked: {0}")]
    Panicked(String),

    /// The player task has shut down.
    #[error("player '{0}' is no longer running")]
    Closed(String),

    /// Failure raised by a custom operation.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlayerError {
    /// Describe a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "unknown panic payload".to_string(),
            },
        };
        Self::Panicked(message)
    }

    pub(crate) fn invalid_payload(kind: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidPayload {
            kind: kind.to_string(),
            reason: reason.to_string(),
        }
    }
}

//! Command-handling units and handler chains.

use serde_json::Value;
use sim_bus::{Acknowledgement, InboundMessage};

use crate::error::PlayerError;
use crate::player::Player;

/// What an operation can see and change while handling one message.
#[derive(Debug)]
pub struct OperationContext<'a> {
    pub player: &'a mut Player,
    pub message: &'a InboundMessage,
}

impl OperationContext<'_> {
    /// Id of the message being handled, for acknowledgements.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message.id
    }

    #[must_use]
    pub fn success(&self) -> Acknowledgement {
        Acknowledgement::success(self.message_id())
    }
}

/// One unit of command-handling logic.
///
/// Closures with the same signature implement this trait.
pub trait Operation: Send + Sync {
    /// Apply the command and describe the outcome.
    ///
    /// # Errors
    ///
    /// Any error becomes an error acknowledgement carrying its message.
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        payload: &Value,
    ) -> Result<Acknowledgement, PlayerError>;
}

impl<F> Operation for F
where
    F: Fn(&mut OperationContext<'_>, &Value) -> Result<Acknowledgement, PlayerError> + Send + Sync,
{
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        payload: &Value,
    ) -> Result<Acknowledgement, PlayerError> {
        self(ctx, payload)
    }
}

/// An ordered chain of operations handling one message type.
///
/// Operations run in order; the first error stops the chain. The
/// acknowledgement of the last operation is the chain's result.
#[derive(Default)]
pub struct MessageHandler {
    operations: Vec<Box<dyn Operation>>,
}

impl std::fmt::Debug for MessageHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHandler")
            .field("operations", &self.operations.len())
            .finish()
    }
}

impl MessageHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler with a single operation.
    pub fn single(operation: impl Operation + 'static) -> Self {
        Self::new().then(operation)
    }

    /// Append an operation to the chain.
    #[must_use]
    pub fn then(mut self, operation: impl Operation + 'static) -> Self {
        self.operations.push(Box::new(operation));
        self
    }

    /// Run the chain.
    ///
    /// # Errors
    ///
    /// Returns the first operation error, or
    /// [`PlayerError::NoAcknowledgement`] if the chain is empty.
    pub fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        payload: &Value,
    ) -> Result<Acknowledgement, PlayerError> {
        let mut last = None;
        for operation in &self.operations {
            last = Some(operation.execute(ctx, payload)?);
        }
        last.ok_or_else(|| PlayerError::NoAcknowledgement(ctx.message.kind.clone()))
    }
}

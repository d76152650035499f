//! Inbound message type → handler registry.

use std::collections::HashMap;

use serde_json::Value;
use sim_bus::Acknowledgement;

use crate::error::PlayerError;
use crate::operation::{MessageHandler, OperationContext};

/// Maps inbound message types to their handlers.
#[derive(Debug, Default)]
pub struct InboundHandlerRegistry {
    handlers: HashMap<String, MessageHandler>,
}

impl InboundHandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for a message type.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::DuplicateHandler`] if the type already has one.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        handler: MessageHandler,
    ) -> Result<(), PlayerError> {
        let kind = kind.into();
        if self.handlers.contains_key(&kind) {
            return Err(PlayerError::DuplicateHandler(kind));
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    #[must_use]
    pub fn has(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered message types, sorted.
    #[must_use]
    pub fn types(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Run the handler for `kind`. Returns `None` if there is none.
    pub fn dispatch(
        &self,
        kind: &str,
        ctx: &mut OperationContext<'_>,
        payload: &Value,
    ) -> Option<Result<Acknowledgement, PlayerError>> {
        self.handlers
            .get(kind)
            .map(|handler| handler.execute(ctx, payload))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sim_bus::InboundMessage;

    use super::*;
    use crate::config::PlayerConfig;
    use crate::player::Player;

    fn ok_handler() -> MessageHandler {
        MessageHandler::single(
            |ctx: &mut OperationContext<'_>, _: &Value| -> Result<Acknowledgement, PlayerError> {
                Ok(ctx.success())
            },
        )
    }

    #[test]
    fn test_register_and_dispatch() {
        let mut registry = InboundHandlerRegistry::new();
        registry.register("ping", ok_handler()).unwrap();
        assert!(registry.has("ping"));
        assert_eq!(registry.types(), vec!["ping"]);

        let mut player = Player::new(PlayerConfig::default()).unwrap();
        let message = InboundMessage::new("ping", json!(null)).with_id("m-9");
        let mut ctx = OperationContext {
            player: &mut player,
            message: &message,
        };
        let ack = registry
            .dispatch("ping", &mut ctx, &message.payload)
            .unwrap()
            .unwrap();
        assert_eq!(ack, Acknowledgement::success("m-9"));

        assert!(registry.dispatch("pong", &mut ctx, &message.payload).is_none());
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let mut registry = InboundHandlerRegistry::new();
        registry.register("ping", ok_handler()).unwrap();
        let err = registry.register("ping", ok_handler()).unwrap_err();
        assert!(matches!(err, PlayerError::DuplicateHandler(kind) if kind == "ping"));
    }
}

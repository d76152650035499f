//! A player bound to an outbound bus and an inbound command protocol.

use std::panic::{self, AssertUnwindSafe};

use sim_bus::{Acknowledgement, Bus, InboundMessage, OutboundMessage, message_types};
use tracing::{debug, error, info, warn};

use crate::error::PlayerError;
use crate::filter::FrameFilter;
use crate::operation::{MessageHandler, OperationContext};
use crate::ops;
use crate::player::Player;
use crate::registry::InboundHandlerRegistry;

/// Binds a [`Player`] to its command handlers and its outbound bus.
///
/// Every inbound message produces exactly one acknowledgement on the
/// outbound bus. Unless that acknowledgement is an error, a filtered frame
/// follows it. Every completed tick also publishes a frame.
///
/// An `IoPlayer` is driven by a single task; see
/// [`spawn`](Self::spawn).
#[derive(Debug)]
pub struct IoPlayer {
    name: String,
    player: Player,
    handlers: InboundHandlerRegistry,
    filter: FrameFilter,
    outbound: Bus<OutboundMessage>,
}

impl IoPlayer {
    /// Bind a player to an outbound bus. No handlers are registered yet.
    pub fn new(name: impl Into<String>, player: Player, outbound: Bus<OutboundMessage>) -> Self {
        Self {
            name: name.into(),
            player,
            handlers: InboundHandlerRegistry::new(),
            filter: FrameFilter::default(),
            outbound,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FrameFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    #[must_use]
    pub fn handlers(&self) -> &InboundHandlerRegistry {
        &self.handlers
    }

    #[must_use]
    pub fn outbound(&self) -> &Bus<OutboundMessage> {
        &self.outbound
    }

    /// Register the handler for one inbound message type.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::DuplicateHandler`] if the type already has one.
    pub fn register_handler(
        &mut self,
        kind: impl Into<String>,
        handler: MessageHandler,
    ) -> Result<(), PlayerError> {
        self.handlers.register(kind, handler)
    }

    /// Register `start`, `pause` and `stop`.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::DuplicateHandler`] if any of them exists.
    pub fn register_lifecycle_handlers(&mut self) -> Result<(), PlayerError> {
        self.register_handler(message_types::START, MessageHandler::single(ops::Start))?;
        self.register_handler(message_types::PAUSE, MessageHandler::single(ops::Pause))?;
        self.register_handler(message_types::STOP, MessageHandler::single(ops::Stop))?;
        Ok(())
    }

    /// The current world, passed through the frame filter.
    #[must_use]
    pub fn frame(&self) -> sim_bus::Frame {
        self.filter.apply(self.player.snapshot())
    }

    /// Handle one inbound message and publish its acknowledgement (and a
    /// frame unless the acknowledgement is an error).
    ///
    /// Handler failures never escape: they become error acknowledgements,
    /// and so do panics raised by an operation.
    pub async fn handle(&mut self, message: InboundMessage) -> Acknowledgement {
        let outcome = {
            let mut ctx = OperationContext {
                player: &mut self.player,
                message: &message,
            };
            let handlers = &self.handlers;
            panic::catch_unwind(AssertUnwindSafe(|| {
                handlers.dispatch(&message.kind, &mut ctx, &message.payload)
            }))
            .unwrap_or_else(|payload| Some(Err(PlayerError::from_panic(payload))))
        };

        let ack = match outcome {
            Some(Ok(ack)) => ack,
            Some(Err(e)) => {
                warn!(player = %self.name, kind = %message.kind, error = %e, "command failed");
                Acknowledgement::error(&message.id, e.to_string())
            }
            None => {
                let e = PlayerError::UnsupportedMessage(message.kind.clone());
                warn!(player = %self.name, kind = %message.kind, "unsupported message type");
                Acknowledgement::error(&message.id, e.to_string())
            }
        };
        debug!(
            player = %self.name,
            message_id = %message.id,
            status = ?ack.status,
            "command acknowledged"
        );

        let publish_frame = !ack.is_error() && !self.player.frames_muted();
        emit(
            &self.name,
            &self.outbound,
            OutboundMessage::acknowledgement(ack.clone()),
        )
        .await;
        if publish_frame {
            let frame = self.frame();
            emit(&self.name, &self.outbound, OutboundMessage::frame(frame)).await;
        }
        ack
    }

    /// Run one tick and publish the resulting frame, unless frames are
    /// muted.
    ///
    /// # Errors
    ///
    /// Returns the tick's failure, including [`PlayerError::Panicked`] for a
    /// system that panicked; no frame is published in that case.
    pub async fn tick(&mut self) -> Result<(), PlayerError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.player.step()))
            .unwrap_or_else(|payload| Err(PlayerError::from_panic(payload)))?;
        if !self.player.frames_muted() {
            let frame = self.frame();
            emit(&self.name, &self.outbound, OutboundMessage::frame(frame)).await;
        }
        Ok(())
    }

    /// Stop the player while shutting down its task.
    pub(crate) fn close(&mut self) {
        if let Err(e) = self.player.stop() {
            error!(player = %self.name, error = %e, "player stop failed during shutdown");
        }
        info!(player = %self.name, "player closed");
    }
}

/// Publish to the outbound bus. Subscriber failures are logged and
/// otherwise ignored; they must not affect the player.
async fn emit(name: &str, outbound: &Bus<OutboundMessage>, message: OutboundMessage) {
    if let Err(e) = outbound.publish(message).await {
        error!(player = %name, error = %e, "outbound publish failed");
    }
}

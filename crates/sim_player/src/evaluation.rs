//! The evaluation player: stores frames from another player for analysis.
//!
//! Each `ingest-frame` command creates a new entity holding the frame as an
//! [`EVALUATION_FRAME`] component. Analysis systems registered on the
//! evaluation player find them with [`ingested_frames`] on later ticks. Both
//! names can be changed through [`EvaluationOptions`].
//!
//! A frame whose metadata (or whose command metadata) sets `historical` to
//! `true` is a replay: after ingesting it the player publishes no frames
//! until a non-historical frame arrives.

use serde::Deserialize;
use serde_json::Value;
use sim_bus::{Acknowledgement, Bus, Frame, InboundMessage, OutboundMessage, message_types};
use sim_ecs::{ComponentType, EntityId, World};
use sim_system::System;

use crate::config::PlayerConfig;
use crate::error::PlayerError;
use crate::filter::FrameFilter;
use crate::io::IoPlayer;
use crate::operation::{MessageHandler, Operation, OperationContext};
use crate::ops::parse_payload;
use crate::player::Player;
use crate::runtime::PlayerHandle;

/// Reserved component type holding an ingested frame.
pub const EVALUATION_FRAME: &str = "evaluation.frame";

fn validate_frame(value: &Value) -> Result<(), String> {
    Frame::deserialize(value)
        .map(|_| ())
        .map_err(|e| format!("not a frame: {e}"))
}

/// Metadata key marking a replayed frame.
pub const HISTORICAL: &str = "historical";

/// A component type storing frames, rejecting anything that is not one.
#[must_use]
pub fn frame_component_type(id: &str) -> ComponentType {
    ComponentType::new(id).with_validator(validate_frame)
}

/// Every frame stored under [`EVALUATION_FRAME`], in ingestion order.
#[must_use]
pub fn ingested_frames(world: &World) -> Vec<(EntityId, Frame)> {
    ingested_frames_of(world, EVALUATION_FRAME)
}

/// Every frame stored under `frame_type`, in ingestion order.
#[must_use]
pub fn ingested_frames_of(world: &World, frame_type: &str) -> Vec<(EntityId, Frame)> {
    world
        .all()
        .into_iter()
        .filter_map(|id| {
            let frame = Frame::deserialize(world.get(&id, frame_type)?).ok()?;
            Some((id, frame))
        })
        .collect()
}

fn is_historical(value: Option<&Value>) -> bool {
    value.and_then(Value::as_bool).unwrap_or(false)
}

/// Message and component names used by an [`EvaluationPlayer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// Inbound message type carrying frames to store.
    pub ingest_type: String,
    /// Component type frames are stored under.
    pub frame_type: String,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            ingest_type: message_types::INGEST_FRAME.to_string(),
            frame_type: EVALUATION_FRAME.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IngestFramePayload {
    frame: Value,
}

/// `ingest-frame`: store a frame on a new entity, and mute frame output
/// while the latest frame is historical.
#[derive(Debug, Clone)]
pub struct IngestFrame {
    frame_type: String,
}

impl IngestFrame {
    pub fn new(frame_type: impl Into<String>) -> Self {
        Self {
            frame_type: frame_type.into(),
        }
    }
}

impl Default for IngestFrame {
    fn default() -> Self {
        Self::new(EVALUATION_FRAME)
    }
}

impl Operation for IngestFrame {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        payload: &Value,
    ) -> Result<Acknowledgement, PlayerError> {
        let request: IngestFramePayload = parse_payload(&ctx.message.kind, payload)?;
        let historical = is_historical(request.frame.pointer("/metadata/historical"))
            || is_historical(ctx.message.metadata.get(HISTORICAL));

        let world = ctx.player.world_mut();
        let entity = world.create(None)?;
        if let Err(e) = world.attach(&entity, &self.frame_type, Some(request.frame)) {
            world.destroy(&entity);
            return Err(e.into());
        }
        ctx.player.set_frames_muted(historical);
        Ok(ctx.success().with_detail(entity.to_string()))
    }
}

/// A player that ingests frames and runs analysis systems over them.
///
/// Besides `ingest-frame` it accepts `start`, `pause` and `stop`, so its
/// analysis systems can tick like any other player's.
#[derive(Debug)]
pub struct EvaluationPlayer {
    io: IoPlayer,
    options: EvaluationOptions,
}

impl EvaluationPlayer {
    pub const NAME: &'static str = "evaluation";

    /// Create an idle evaluation player with the default names.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Config`] for an invalid configuration.
    pub fn new(config: PlayerConfig, outbound: Bus<OutboundMessage>) -> Result<Self, PlayerError> {
        Self::with_options(config, outbound, EvaluationOptions::default())
    }

    /// Create an idle evaluation player listening for `options.ingest_type`
    /// and storing frames under `options.frame_type`.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Config`] for an invalid configuration, or
    /// [`PlayerError::DuplicateHandler`] if the ingest type collides with a
    /// lifecycle command.
    pub fn with_options(
        config: PlayerConfig,
        outbound: Bus<OutboundMessage>,
        options: EvaluationOptions,
    ) -> Result<Self, PlayerError> {
        let mut world = World::new();
        world.register_type(frame_component_type(&options.frame_type))?;

        let player = Player::with_world(config, world)?;
        let mut io = IoPlayer::new(Self::NAME, player, outbound);
        io.register_lifecycle_handlers()?;
        io.register_handler(
            options.ingest_type.clone(),
            MessageHandler::single(IngestFrame::new(options.frame_type.clone())),
        )?;
        Ok(Self { io, options })
    }

    #[must_use]
    pub fn options(&self) -> &EvaluationOptions {
        &self.options
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FrameFilter) -> Self {
        self.io = self.io.with_filter(filter);
        self
    }

    /// Register an analysis system.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::System`] if the id is already taken.
    pub fn register_system(&mut self, system: Box<dyn System>, priority: i32) -> Result<(), PlayerError> {
        self.io.player_mut().register_system(system, priority)
    }

    #[must_use]
    pub fn io(&self) -> &IoPlayer {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut IoPlayer {
        &mut self.io
    }

    /// Move the player onto its own task, listening on `inbound`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(self, inbound: &Bus<InboundMessage>) -> PlayerHandle {
        self.io.spawn(inbound)
    }
}

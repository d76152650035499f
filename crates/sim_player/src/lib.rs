//! # sim_player
//!
//! Runs a world and its systems on a tick loop and exposes it through a
//! command protocol.
//!
//! - [`Player`] — the `idle → running → paused → idle` state machine and a
//!   single-tick `step`.
//! - [`IoPlayer`] — a player bound to an [`InboundHandlerRegistry`], a
//!   [`FrameFilter`] and an outbound bus. Every inbound message yields exactly
//!   one [`Acknowledgement`](sim_bus::Acknowledgement).
//! - [`PlayerHandle`] — talks to a player running on its own Tokio task.
//! - [`SimulationPlayer`] / [`EvaluationPlayer`] — the two stock players.
//! - [`pipe_frames`] — connects a simulation's frames to an evaluation.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sim_bus::Bus;
//! use sim_player::{PlayerConfig, SimulationPlayer, SystemCatalog};
//!
//! # async fn run() -> Result<(), sim_player::PlayerError> {
//! let inbound = Bus::new();
//! let outbound = Bus::new();
//! let sim = SimulationPlayer::new(
//!     PlayerConfig::default().with_tick_rate(30.0),
//!     outbound.clone(),
//!     Arc::new(SystemCatalog::new()),
//! )?;
//! let handle = sim.spawn(&inbound);
//! handle.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod filter;
pub mod io;
pub mod operation;
pub mod ops;
pub mod pipe;
pub mod player;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod simulation;

pub use clock::TickClock;
pub use config::{DeltaMode, PlayerConfig, ScheduleMode};
pub use error::PlayerError;
pub use evaluation::{
    EVALUATION_FRAME, EvaluationOptions, EvaluationPlayer, HISTORICAL, IngestFrame,
    frame_component_type, ingested_frames, ingested_frames_of,
};
pub use filter::FrameFilter;
pub use io::IoPlayer;
pub use operation::{MessageHandler, Operation, OperationContext};
pub use pipe::{pipe_frames, pipe_frames_to};
pub use player::{Player, PlayerState};
pub use registry::InboundHandlerRegistry;
pub use resolver::{ResolveError, SystemCatalog, SystemResolver};
pub use runtime::{PlayerHandle, PlayerStatus};
pub use simulation::{EjectSystem, InjectEntity, InjectSystem, SimulationPlayer};

//! The player state machine.
//!
//! A [`Player`] owns one world and one system manager and knows how to run a
//! single tick. It does not schedule anything by itself: the driver task in
//! [`runtime`](crate::runtime) decides when ticks happen, which is also what
//! makes `pause` and `stop` wait for an in-flight tick.

use serde_json::{Map, json};
use sim_bus::{EntitySnapshot, Frame};
use sim_ecs::World;
use sim_system::{System, SystemManager};
use tracing::{debug, info};

use crate::clock::TickClock;
use crate::config::PlayerConfig;
use crate::error::PlayerError;

/// Lifecycle state of a [`Player`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// Initial state, and the state after every stop.
    #[default]
    Idle,
    Running,
    Paused,
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
        })
    }
}

/// One simulation instance: world, systems, tick counter and lifecycle.
#[derive(Debug)]
pub struct Player {
    config: PlayerConfig,
    world: World,
    systems: SystemManager,
    state: PlayerState,
    tick: u64,
    last_delta: f64,
    initialized: bool,
    frames_muted: bool,
    clock: TickClock,
}

impl Player {
    /// Create an idle player with an empty world.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Config`] if the configuration is invalid.
    pub fn new(config: PlayerConfig) -> Result<Self, PlayerError> {
        Self::with_world(config, World::new())
    }

    /// Create an idle player around a prepared world, for example one with
    /// component types already registered.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Config`] if the configuration is invalid.
    pub fn with_world(config: PlayerConfig, world: World) -> Result<Self, PlayerError> {
        config.validate()?;
        let clock = TickClock::new(config.delta, config.tick_interval());
        Ok(Self {
            config,
            world,
            systems: SystemManager::new(),
            state: PlayerState::Idle,
            tick: 0,
            last_delta: 0.0,
            initialized: false,
            frames_muted: false,
            clock,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// Number of completed ticks since the last stop.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds since the last stop.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.systems.elapsed()
    }

    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    #[must_use]
    pub fn systems(&self) -> &SystemManager {
        &self.systems
    }

    /// Whether frame output is currently suppressed.
    #[must_use]
    pub fn frames_muted(&self) -> bool {
        self.frames_muted
    }

    /// Suppress or resume frame output. While muted, an
    /// [`IoPlayer`](crate::IoPlayer) still acknowledges commands and ticks,
    /// but publishes no frames. A stop unmutes.
    pub fn set_frames_muted(&mut self, muted: bool) {
        self.frames_muted = muted;
    }

    // -- Systems --

    /// Register a system on the live scheduler. It is initialised before its
    /// first update.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::System`] if the id is already taken.
    pub fn register_system(&mut self, system: Box<dyn System>, priority: i32) -> Result<(), PlayerError> {
        self.systems.register(system, priority)?;
        Ok(())
    }

    /// Remove a system, shutting it down if it was initialised. Returns
    /// `false` if no system has this id.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::System`] if the shutdown hook fails.
    pub fn unregister_system(&mut self, id: &str) -> Result<bool, PlayerError> {
        Ok(self.systems.unregister(id, &mut self.world)?)
    }

    // -- Lifecycle --

    /// Move to `running`. From `idle` this initialises every system once.
    /// Starting a running player does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::System`] if a system fails to initialise; the
    /// player then stays in its previous state.
    pub fn start(&mut self) -> Result<(), PlayerError> {
        if self.state == PlayerState::Running {
            return Ok(());
        }
        if !self.initialized {
            self.systems.initialize_all(&mut self.world)?;
            self.initialized = true;
        }
        self.clock.restart();
        info!(from = %self.state, tick = self.tick, "player started");
        self.state = PlayerState::Running;
        Ok(())
    }

    /// Move from `running` to `paused`. Returns `false` and changes nothing
    /// in any other state.
    pub fn pause(&mut self) -> bool {
        if self.state != PlayerState::Running {
            return false;
        }
        self.state = PlayerState::Paused;
        info!(tick = self.tick, "player paused");
        true
    }

    /// Shut every system down, destroy every entity, reset tick and elapsed
    /// time, and return to `idle`. Valid from any state.
    ///
    /// # Errors
    ///
    /// Returns the first shutdown hook failure. The reset happens regardless.
    pub fn stop(&mut self) -> Result<(), PlayerError> {
        let shutdown = self.systems.shutdown_all(&mut self.world);
        self.world.destroy_all();
        self.systems.reset_elapsed();
        self.tick = 0;
        self.last_delta = 0.0;
        self.initialized = false;
        self.frames_muted = false;
        self.clock.restart();
        self.state = PlayerState::Idle;
        info!("player stopped");
        shutdown.map_err(PlayerError::from)
    }

    /// Run exactly one tick, regardless of state.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::System`] if a system fails. The rest of that
    /// tick's systems are skipped and the tick counter does not advance.
    pub fn step(&mut self) -> Result<(), PlayerError> {
        let delta = self.clock.next_delta();
        self.systems.update(delta, &mut self.world)?;
        self.tick += 1;
        self.last_delta = delta;
        debug!(
            tick = self.tick,
            delta,
            elapsed = self.systems.elapsed(),
            "tick complete"
        );
        Ok(())
    }

    /// Snapshot every entity and its components, in creation order.
    #[must_use]
    pub fn snapshot(&self) -> Frame {
        let components = self.world.components();
        let entities = self
            .world
            .all()
            .into_iter()
            .map(|id| EntitySnapshot {
                components: components.components_of(&id),
                id,
            })
            .collect();

        let mut metadata = Map::new();
        metadata.insert("elapsed".into(), json!(self.systems.elapsed()));
        metadata.insert("deltaTime".into(), json!(self.last_delta));

        Frame {
            tick: self.tick,
            entities,
            metadata,
        }
    }
}

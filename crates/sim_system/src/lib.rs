//! # sim_system
//!
//! Behaviour that runs every tick.
//!
//! - [`System`] — the contract: an id plus optional `initialize`, `update` and
//!   `shutdown` hooks that default to no-ops.
//! - [`SystemContext`] — what a hook sees: the world, delta and elapsed time.
//! - [`SystemManager`] — priority-ordered scheduler with lazy initialisation
//!   and reverse-order teardown.
//! - [`TimeSystem`] — built-in system keeping a `time` entity up to date.
//!
//! ## Usage
//!
//! ```rust
//! use sim_ecs::World;
//! use sim_system::{SystemManager, system_fn};
//!
//! let mut world = World::new();
//! let mut systems = SystemManager::new();
//! systems
//!     .register(Box::new(system_fn("noop", |_ctx| Ok(()))), 0)
//!     .unwrap();
//! systems.update(0.5, &mut world).unwrap();
//! assert_eq!(systems.elapsed(), 0.5);
//! ```

pub mod context;
pub mod error;
pub mod manager;
pub mod system;
pub mod time;

pub use context::SystemContext;
pub use error::{HookPhase, SystemError};
pub use manager::SystemManager;
pub use system::{FnSystem, System, system_fn};
pub use time::{TIME_COMPONENT, TIME_ENTITY, TimeSystem};

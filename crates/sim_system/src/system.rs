//! The [`System`] contract.
//!
//! Hooks are optional: every method except [`System::id`] has a no-op default,
//! so a system only implements what it needs. Hooks return `anyhow::Result`
//! because systems are user code with arbitrary failure types.

use crate::context::SystemContext;

/// A unit of per-tick behaviour.
pub trait System: Send {
    /// Unique id within one [`SystemManager`](crate::SystemManager).
    fn id(&self) -> &str;

    /// Called once before the first update, or again after a shutdown.
    fn initialize(&mut self, _ctx: &mut SystemContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once per tick, in priority order.
    fn update(&mut self, _ctx: &mut SystemContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when the system is unregistered or the player stops.
    fn shutdown(&mut self, _ctx: &mut SystemContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A system whose `update` hook is a closure.
pub struct FnSystem<F> {
    id: String,
    update: F,
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut SystemContext<'_>) -> anyhow::Result<()> + Send,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) -> anyhow::Result<()> {
        (self.update)(ctx)
    }
}

/// Build a [`System`] from an id and an update closure.
pub fn system_fn<F>(id: impl Into<String>, update: F) -> FnSystem<F>
where
    F: FnMut(&mut SystemContext<'_>) -> anyhow::Result<()> + Send,
{
    FnSystem {
        id: id.into(),
        update,
    }
}

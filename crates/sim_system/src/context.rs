//! Per-hook execution context provided to systems.

use sim_ecs::World;

/// Context handed to a system hook.
///
/// `delta_time` is zero for `initialize` and `shutdown`.
#[derive(Debug)]
pub struct SystemContext<'w> {
    /// The player's world, exclusively borrowed for the duration of the hook.
    pub world: &'w mut World,
    /// Simulated seconds advanced by this tick.
    pub delta_time: f64,
    /// Total simulated seconds including this tick.
    pub elapsed_time: f64,
}

impl<'w> SystemContext<'w> {
    /// Create a context for one hook invocation.
    #[must_use]
    pub fn new(world: &'w mut World, delta_time: f64, elapsed_time: f64) -> Self {
        Self {
            world,
            delta_time,
            elapsed_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_creation() {
        let mut world = World::new();
        let ctx = SystemContext::new(&mut world, 0.016, 1.0);
        assert!((ctx.delta_time - 0.016).abs() < f64::EPSILON);
        assert!((ctx.elapsed_time - 1.0).abs() < f64::EPSILON);
        assert!(ctx.world.all().is_empty());
    }
}

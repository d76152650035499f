//! Built-in system publishing simulated time into the world.

use serde_json::json;
use sim_ecs::{ComponentType, EntityId, World};

use crate::context::SystemContext;
use crate::system::System;

/// Component type id holding `{ "elapsed": f64, "ticks": u64 }`.
pub const TIME_COMPONENT: &str = "time";

/// Entity id of the singleton time entity.
pub const TIME_ENTITY: &str = "time";

/// Keeps a `time` entity with elapsed seconds and a tick count.
///
/// Register it at a low priority so other systems read the current tick's
/// values.
#[derive(Debug, Default)]
pub struct TimeSystem {
    elapsed: f64,
    ticks: u64,
}

impl TimeSystem {
    pub const ID: &'static str = "time";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entity() -> EntityId {
        EntityId::from(TIME_ENTITY)
    }

    fn ensure(world: &mut World) -> anyhow::Result<()> {
        world.ensure_type(
            ComponentType::new(TIME_COMPONENT).with_defaults(json!({ "elapsed": 0.0, "ticks": 0 })),
        );
        let entity = Self::entity();
        if !world.has(&entity) {
            world.create(Some(entity.clone()))?;
        }
        if world.get(&entity, TIME_COMPONENT).is_none() {
            world.attach(&entity, TIME_COMPONENT, None)?;
        }
        Ok(())
    }
}

impl System for TimeSystem {
    fn id(&self) -> &str {
        Self::ID
    }

    fn initialize(&mut self, ctx: &mut SystemContext<'_>) -> anyhow::Result<()> {
        self.elapsed = 0.0;
        self.ticks = 0;
        Self::ensure(ctx.world)
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) -> anyhow::Result<()> {
        // The world may have been cleared by a stop since initialisation.
        Self::ensure(ctx.world)?;
        self.elapsed += ctx.delta_time;
        self.ticks += 1;
        ctx.world.set(
            &Self::entity(),
            TIME_COMPONENT,
            json!({ "elapsed": self.elapsed, "ticks": self.ticks }),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::SystemManager;

    #[test]
    fn test_time_entity_tracks_ticks() {
        let mut world = World::new();
        let mut systems = SystemManager::new();
        systems.register(Box::new(TimeSystem::new()), -100).unwrap();

        systems.initialize_all(&mut world).unwrap();
        let entity = EntityId::from(TIME_ENTITY);
        assert_eq!(
            world.get(&entity, TIME_COMPONENT),
            Some(&json!({ "elapsed": 0.0, "ticks": 0 }))
        );

        systems.update(0.5, &mut world).unwrap();
        systems.update(0.25, &mut world).unwrap();
        assert_eq!(
            world.get(&entity, TIME_COMPONENT),
            Some(&json!({ "elapsed": 0.75, "ticks": 2 }))
        );
    }

    #[test]
    fn test_time_entity_recreated_after_world_cleared() {
        let mut world = World::new();
        let mut systems = SystemManager::new();
        systems.register(Box::new(TimeSystem::new()), 0).unwrap();
        systems.update(1.0, &mut world).unwrap();

        world.destroy_all();
        systems.update(1.0, &mut world).unwrap();

        let time = world.get(&EntityId::from(TIME_ENTITY), TIME_COMPONENT).unwrap();
        assert_eq!(time["ticks"], 2);
    }
}

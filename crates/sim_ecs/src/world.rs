//! World state owned by a single player.
//!
//! The [`World`] pairs the [`EntityManager`] with the [`ComponentManager`] so
//! that entity destruction always cascades to components, and so systems get
//! one handle to everything they may read or write during a tick.

use serde_json::Value;

use crate::component::{ComponentManager, ComponentType};
use crate::entity::{EntityId, EntityManager};
use crate::error::EcsError;

/// Entity identity plus component storage.
#[derive(Debug, Default)]
pub struct World {
    entities: EntityManager,
    components: ComponentManager,
}

impl World {
    /// Create an empty world with a strict component manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a world around an already configured component manager.
    #[must_use]
    pub fn with_components(components: ComponentManager) -> Self {
        Self {
            entities: EntityManager::new(),
            components,
        }
    }

    /// Returns the entity manager.
    #[must_use]
    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    /// Returns the component manager.
    #[must_use]
    pub fn components(&self) -> &ComponentManager {
        &self.components
    }

    /// Returns the component manager mutably.
    pub fn components_mut(&mut self) -> &mut ComponentManager {
        &mut self.components
    }

    // -- Entity lifecycle --

    /// Create an entity with an explicit or allocated id.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateEntity`] if the explicit id is alive.
    pub fn create(&mut self, id: Option<EntityId>) -> Result<EntityId, EcsError> {
        self.entities.create(id)
    }

    /// Destroy an entity together with all of its components.
    pub fn destroy(&mut self, id: &EntityId) -> bool {
        self.entities.destroy(id, &mut self.components)
    }

    /// Destroy every entity.
    pub fn destroy_all(&mut self) {
        self.entities.destroy_all(&mut self.components);
    }

    /// Returns `true` if the entity is alive.
    #[must_use]
    pub fn has(&self, id: &EntityId) -> bool {
        self.entities.has(id)
    }

    /// Returns alive entities in creation order.
    #[must_use]
    pub fn all(&self) -> Vec<EntityId> {
        self.entities.all()
    }

    // -- Component operations --

    /// Register a component type.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateComponentType`] if already registered.
    pub fn register_type(&mut self, ty: ComponentType) -> Result<(), EcsError> {
        self.components.register_type(ty)
    }

    /// Register a type unless one with the same id already exists.
    pub fn ensure_type(&mut self, ty: ComponentType) {
        if !self.components.is_registered(ty.id()) {
            // The id was just checked, so this cannot collide.
            let _ = self.components.register_type(ty);
        }
    }

    /// Attach a component to a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityNotFound`] for dead entities, plus every
    /// error of [`ComponentManager::attach`].
    pub fn attach(
        &mut self,
        entity: &EntityId,
        type_id: &str,
        payload: Option<Value>,
    ) -> Result<&Value, EcsError> {
        self.require(entity)?;
        self.components.attach(entity, type_id, payload)
    }

    /// Attach or overwrite a component on a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityNotFound`] for dead entities, plus every
    /// error of [`ComponentManager::set`].
    pub fn set(&mut self, entity: &EntityId, type_id: &str, payload: Value) -> Result<&Value, EcsError> {
        self.require(entity)?;
        self.components.set(entity, type_id, payload)
    }

    /// Returns a component payload.
    #[must_use]
    pub fn get(&self, entity: &EntityId, type_id: &str) -> Option<&Value> {
        self.components.get(entity, type_id)
    }

    /// Merge a partial payload into an existing component.
    ///
    /// # Errors
    ///
    /// See [`ComponentManager::update`].
    pub fn update(&mut self, entity: &EntityId, type_id: &str, patch: Value) -> Result<&Value, EcsError> {
        self.components.update(entity, type_id, patch)
    }

    /// Remove one component from an entity.
    ///
    /// # Errors
    ///
    /// See [`ComponentManager::remove`].
    pub fn remove(&mut self, entity: &EntityId, type_id: &str) -> Result<bool, EcsError> {
        self.components.remove(entity, type_id)
    }

    /// Returns the entities holding a component of this type.
    ///
    /// # Errors
    ///
    /// See [`ComponentManager::entities_with_type`].
    pub fn entities_with_type(&self, type_id: &str) -> Result<Vec<EntityId>, EcsError> {
        self.components.entities_with_type(type_id)
    }

    fn require(&self, entity: &EntityId) -> Result<(), EcsError> {
        if self.entities.has(entity) {
            Ok(())
        } else {
            Err(EcsError::EntityNotFound(entity.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn make_test_world() -> World {
        let mut world = World::new();
        world.register_type(ComponentType::new("position")).unwrap();
        world.register_type(ComponentType::new("velocity")).unwrap();
        world
    }

    #[test]
    fn test_attach_requires_live_entity() {
        let mut world = make_test_world();
        let err = world
            .attach(&EntityId::Seq(42), "position", Some(json!({"x": 0})))
            .unwrap_err();
        assert!(matches!(err, EcsError::EntityNotFound(_)));
    }

    #[test]
    fn test_destroy_cascades_to_every_type() {
        let mut world = make_test_world();
        let a = world.create(None).unwrap();
        let b = world.create(None).unwrap();
        for e in [&a, &b] {
            world.attach(e, "position", Some(json!({"x": 1}))).unwrap();
            world.attach(e, "velocity", Some(json!({"dx": 1}))).unwrap();
        }

        assert!(world.destroy(&a));
        assert!(!world.has(&a));
        for ty in ["position", "velocity"] {
            assert_eq!(world.entities_with_type(ty).unwrap(), vec![b.clone()]);
        }
        assert!(world.get(&a, "position").is_none());
    }

    #[test]
    fn test_destroy_all_empties_storage() {
        let mut world = make_test_world();
        for _ in 0..3 {
            let e = world.create(None).unwrap();
            world.attach(&e, "position", None).unwrap();
        }
        world.destroy_all();
        assert!(world.all().is_empty());
        assert!(world.entities_with_type("position").unwrap().is_empty());
    }

    #[test]
    fn test_ensure_type_is_idempotent() {
        let mut world = make_test_world();
        world.ensure_type(ComponentType::new("position"));
        world.ensure_type(ComponentType::new("mass"));
        assert_eq!(
            world.components().registered_types(),
            vec!["mass", "position", "velocity"]
        );
    }
}

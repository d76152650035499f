//! Component types and payload storage.
//!
//! Components are not Rust types here: payloads are `serde_json::Value`
//! documents keyed by a string type id, so systems plugged in at runtime and
//! frames arriving from another player can share one representation. A
//! [`ComponentType`] optionally carries a default document and a validator
//! that every stored payload must pass.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::entity::EntityId;
use crate::error::EcsError;

/// String identity of a component type (e.g. `"temperature"`).
pub type ComponentTypeId = String;

/// Validation predicate applied to every payload stored under a type.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A component type: identity token, optional defaults, optional validator.
#[derive(Clone)]
pub struct ComponentType {
    id: ComponentTypeId,
    defaults: Option<Value>,
    validator: Option<Validator>,
}

impl ComponentType {
    /// Create a type with no defaults and no validation.
    #[must_use]
    pub fn new(id: impl Into<ComponentTypeId>) -> Self {
        Self {
            id: id.into(),
            defaults: None,
            validator: None,
        }
    }

    /// Default document used when `attach` is called without a payload, and
    /// merged underneath partial payloads.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Reject payloads for which `validator` returns an error message.
    #[must_use]
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Returns the type id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the default document, if any.
    #[must_use]
    pub fn defaults(&self) -> Option<&Value> {
        self.defaults.as_ref()
    }

    /// Build the stored value for a payload: defaults merged with the payload,
    /// then validated.
    fn instantiate(&self, payload: Option<Value>) -> Result<Value, EcsError> {
        let value = match (&self.defaults, payload) {
            (Some(defaults), Some(payload)) => {
                let mut value = defaults.clone();
                merge_values(&mut value, payload);
                value
            }
            (Some(defaults), None) => defaults.clone(),
            (None, Some(payload)) => payload,
            (None, None) => Value::Null,
        };
        self.validate(&value)?;
        Ok(value)
    }

    fn validate(&self, value: &Value) -> Result<(), EcsError> {
        match &self.validator {
            Some(validator) => validator(value).map_err(|message| EcsError::Validation {
                component: self.id.clone(),
                message,
            }),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentType")
            .field("id", &self.id)
            .field("defaults", &self.defaults)
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

/// Merge `patch` into `target`.
///
/// When both sides are objects, keys are merged recursively; otherwise the
/// patch replaces the target wholesale.
pub fn merge_values(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_values(existing, value);
                    }
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

/// One registered type and every instance stored under it.
#[derive(Debug)]
struct TypeRecord {
    ty: ComponentType,
    instances: BTreeMap<EntityId, Value>,
}

/// Payload storage keyed by (entity, component type).
///
/// The registry of types belongs to this manager alone; uniqueness is checked
/// per instance. In strict mode (the default) attaching a type an entity
/// already holds is an error; otherwise the payload is overwritten.
#[derive(Debug)]
pub struct ComponentManager {
    strict: bool,
    types: HashMap<ComponentTypeId, TypeRecord>,
}

impl ComponentManager {
    /// Create an empty, strict manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            strict: true,
            types: HashMap::new(),
        }
    }

    /// Choose whether `attach` rejects an already-attached type.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Register a component type.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateComponentType`] if the id is taken.
    pub fn register_type(&mut self, ty: ComponentType) -> Result<(), EcsError> {
        if self.types.contains_key(ty.id()) {
            return Err(EcsError::DuplicateComponentType(ty.id().to_string()));
        }
        debug!(component = ty.id(), "component type registered");
        self.types.insert(
            ty.id().to_string(),
            TypeRecord {
                ty,
                instances: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Returns `true` if a type with this id is registered.
    #[must_use]
    pub fn is_registered(&self, type_id: &str) -> bool {
        self.types.contains_key(type_id)
    }

    /// Returns the registered type with this id.
    #[must_use]
    pub fn component_type(&self, type_id: &str) -> Option<&ComponentType> {
        self.types.get(type_id).map(|record| &record.ty)
    }

    /// Returns the ids of every registered type, sorted.
    #[must_use]
    pub fn registered_types(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.types.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Attach a component to an entity and return the stored payload.
    ///
    /// # Errors
    ///
    /// Fails if the type is unknown, if the entity already holds it in strict
    /// mode, or if validation rejects the payload.
    pub fn attach(
        &mut self,
        entity: &EntityId,
        type_id: &str,
        payload: Option<Value>,
    ) -> Result<&Value, EcsError> {
        let strict = self.strict;
        let record = self.record_mut(type_id)?;
        if strict && record.instances.contains_key(entity) {
            return Err(EcsError::ComponentAlreadyAttached {
                entity: entity.clone(),
                component: type_id.to_string(),
            });
        }
        let value = record.ty.instantiate(payload)?;
        record.instances.insert(entity.clone(), value);
        Ok(&record.instances[entity])
    }

    /// Attach or overwrite a component regardless of strict mode.
    ///
    /// # Errors
    ///
    /// Fails if the type is unknown or validation rejects the payload.
    pub fn set(
        &mut self,
        entity: &EntityId,
        type_id: &str,
        payload: Value,
    ) -> Result<&Value, EcsError> {
        let record = self.record_mut(type_id)?;
        let value = record.ty.instantiate(Some(payload))?;
        record.instances.insert(entity.clone(), value);
        Ok(&record.instances[entity])
    }

    /// Returns the payload an entity holds for a type.
    #[must_use]
    pub fn get(&self, entity: &EntityId, type_id: &str) -> Option<&Value> {
        self.types
            .get(type_id)
            .and_then(|record| record.instances.get(entity))
    }

    /// Returns `true` if the entity holds a component of this type.
    #[must_use]
    pub fn has(&self, entity: &EntityId, type_id: &str) -> bool {
        self.get(entity, type_id).is_some()
    }

    /// Merge a partial payload into an existing component.
    ///
    /// Nested objects are merged recursively; any other field is replaced. The
    /// merged result is validated before it is stored, so a rejected update
    /// leaves the old payload in place.
    ///
    /// # Errors
    ///
    /// Fails if the type is unknown, the component is absent, or validation
    /// rejects the merged payload.
    pub fn update(
        &mut self,
        entity: &EntityId,
        type_id: &str,
        patch: Value,
    ) -> Result<&Value, EcsError> {
        let record = self.record_mut(type_id)?;
        let Some(current) = record.instances.get(entity) else {
            return Err(EcsError::ComponentNotFound {
                entity: entity.clone(),
                component: type_id.to_string(),
            });
        };
        let mut merged = current.clone();
        merge_values(&mut merged, patch);
        record.ty.validate(&merged)?;
        record.instances.insert(entity.clone(), merged);
        Ok(&record.instances[entity])
    }

    /// Remove one component. Returns `true` if it was attached.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponentType`] if the type is unknown.
    pub fn remove(&mut self, entity: &EntityId, type_id: &str) -> Result<bool, EcsError> {
        let record = self.record_mut(type_id)?;
        Ok(record.instances.remove(entity).is_some())
    }

    /// Remove every component an entity holds. Returns how many were removed.
    pub fn remove_all_for_entity(&mut self, entity: &EntityId) -> usize {
        self.types
            .values_mut()
            .filter_map(|record| record.instances.remove(entity))
            .count()
    }

    /// Returns the entities holding a component of this type, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponentType`] if the type is unknown.
    pub fn entities_with_type(&self, type_id: &str) -> Result<Vec<EntityId>, EcsError> {
        self.types
            .get(type_id)
            .map(|record| record.instances.keys().cloned().collect())
            .ok_or_else(|| EcsError::UnknownComponentType(type_id.to_string()))
    }

    /// Snapshot of every component an entity holds, keyed by type id.
    #[must_use]
    pub fn components_of(&self, entity: &EntityId) -> BTreeMap<ComponentTypeId, Value> {
        self.types
            .iter()
            .filter_map(|(id, record)| {
                record
                    .instances
                    .get(entity)
                    .map(|value| (id.clone(), value.clone()))
            })
            .collect()
    }

    fn record_mut(&mut self, type_id: &str) -> Result<&mut TypeRecord, EcsError> {
        self.types
            .get_mut(type_id)
            .ok_or_else(|| EcsError::UnknownComponentType(type_id.to_string()))
    }
}

impl Default for ComponentManager {
    fn default() -> Self {
        Self::new()
    }
}

//! ECS error types.

use crate::entity::EntityId;

/// Errors raised synchronously by the entity and component managers.
///
/// These never escape a player as a crash: the inbound protocol converts them
/// into error acknowledgements.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// An explicit entity id was requested that is already alive.
    #[error("entity {0} already exists")]
    DuplicateEntity(EntityId),

    /// A component type id was registered twice on the same manager.
    #[error("component type '{0}' is already registered")]
    DuplicateComponentType(String),

    /// A component of an unknown type was referenced.
    #[error("component type '{0}' is not registered")]
    UnknownComponentType(String),

    /// The entity already holds a component of this type (strict attach).
    #[error("entity {entity} already has a component of type '{component}'")]
    ComponentAlreadyAttached { entity: EntityId, component: String },

    /// The entity does not hold a component of this type.
    #[error("component '{component}' not found on entity {entity}")]
    ComponentNotFound { entity: EntityId, component: String },

    /// The entity is not alive in this world.
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    /// The payload was rejected by the component type's validator.
    #[error("validation error on '{component}': {message}")]
    Validation { component: String, message: String },
}

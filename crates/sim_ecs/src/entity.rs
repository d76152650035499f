//! Entity identifiers and the identity lifecycle.
//!
//! An [`EntityId`] carries no data of its own. The [`EntityManager`] decides
//! which ids are alive and remembers the order they were created in, which is
//! the order frames list them.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::component::ComponentManager;
use crate::error::EcsError;

/// A unique entity identifier.
///
/// Ids are either allocated sequentially by the [`EntityManager`] or supplied
/// by the caller as a string (e.g. `"time"`). On the wire an id is a bare JSON
/// number or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Allocated by the manager. Sequence ids start at 1.
    Seq(u64),
    /// Chosen by the caller.
    Named(String),
}

impl EntityId {
    /// Returns the sequence number if this id was allocated numerically.
    #[must_use]
    pub fn as_seq(&self) -> Option<u64> {
        match self {
            Self::Seq(n) => Some(*n),
            Self::Named(_) => None,
        }
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seq(n) => write!(f, "{n}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl From<u64> for EntityId {
    fn from(n: u64) -> Self {
        Self::Seq(n)
    }
}

impl From<&str> for EntityId {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for EntityId {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

/// Owns entity identity: which ids are alive and in which order they appeared.
///
/// Destroying an entity requires the [`ComponentManager`] so that every
/// component attached to it is dropped in the same call.
#[derive(Debug)]
pub struct EntityManager {
    /// Next candidate for a sequential id.
    next_id: u64,
    /// Creation counter, used to keep [`EntityManager::all`] ordered.
    created: u64,
    /// Alive entities keyed by creation order.
    order: BTreeMap<u64, EntityId>,
    /// Reverse lookup from id to creation order.
    index: HashMap<EntityId, u64>,
}

impl EntityManager {
    /// Create an empty manager. Sequential ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            created: 0,
            order: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    /// Create an entity, either with the given id or the next free sequential id.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateEntity`] if an explicit id is already alive.
    pub fn create(&mut self, id: Option<EntityId>) -> Result<EntityId, EcsError> {
        let id = match id {
            Some(id) => {
                if self.index.contains_key(&id) {
                    return Err(EcsError::DuplicateEntity(id));
                }
                id
            }
            None => self.allocate(),
        };

        self.created += 1;
        self.order.insert(self.created, id.clone());
        self.index.insert(id.clone(), self.created);
        debug!(entity = %id, "entity created");
        Ok(id)
    }

    /// Destroy an entity and every component attached to it.
    ///
    /// Returns `true` if the entity was alive.
    pub fn destroy(&mut self, id: &EntityId, components: &mut ComponentManager) -> bool {
        let Some(slot) = self.index.remove(id) else {
            return false;
        };
        self.order.remove(&slot);
        components.remove_all_for_entity(id);
        debug!(entity = %id, "entity destroyed");
        true
    }

    /// Destroy every alive entity, cascading to their components.
    pub fn destroy_all(&mut self, components: &mut ComponentManager) {
        for id in self.all() {
            self.destroy(&id, components);
        }
    }

    /// Returns `true` if the entity is alive.
    #[must_use]
    pub fn has(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    /// Returns all alive entities in creation order.
    #[must_use]
    pub fn all(&self) -> Vec<EntityId> {
        self.order.values().cloned().collect()
    }

    /// Returns the number of alive entities.
    #[must_use]
    pub fn count(&self) -> usize {
        self.index.len()
    }

    /// Skip over sequential ids a caller already claimed explicitly.
    fn allocate(&mut self) -> EntityId {
        loop {
            let candidate = EntityId::Seq(self.next_id);
            self.next_id += 1;
            if !self.index.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

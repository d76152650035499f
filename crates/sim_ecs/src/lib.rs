//! # sim_ecs
//!
//! The data half of the simulation runtime: who exists and what they carry.
//!
//! This crate provides:
//!
//! - [`EntityId`] — a sequential integer or caller-chosen string identifier.
//! - [`EntityManager`] — entity identity lifecycle (create/destroy/lookup).
//! - [`ComponentType`] — a component identity with optional defaults and validator.
//! - [`ComponentManager`] — JSON payload storage keyed by (entity, component type).
//! - [`World`] — the pair of managers owned by one player, with cascading destroy.
//! - [`EcsError`] — registration and validation failures.

pub mod component;
pub mod entity;
pub mod error;
pub mod world;

pub use component::{ComponentManager, ComponentType, ComponentTypeId, merge_values};
pub use entity::{EntityId, EntityManager};
pub use error::EcsError;
pub use world::World;

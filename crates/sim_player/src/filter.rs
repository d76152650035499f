//! Projection and redaction applied to frames before they are published.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use sim_bus::Frame;
use sim_ecs::EntityId;

type Redactor = Arc<dyn Fn(&Value) -> Value + Send + Sync>;
type ComponentPredicate = Arc<dyn Fn(&EntityId, &str) -> bool + Send + Sync>;

/// Chooses which components leave the player and how they look.
///
/// A block-list always removes its types, an allow-list (if set) keeps only
/// the listed component types, and a predicate (if set) decides for each
/// remaining (entity, component) pair. A redactor then rewrites the payload
/// of one type. The default filter passes frames through unchanged.
#[derive(Clone, Default)]
pub struct FrameFilter {
    allow: Option<HashSet<String>>,
    block: HashSet<String>,
    predicate: Option<ComponentPredicate>,
    redactors: HashMap<String, Redactor>,
}

impl std::fmt::Debug for FrameFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameFilter")
            .field("allow", &self.allow)
            .field("block", &self.block)
            .field("predicate", &self.predicate.is_some())
            .field("redacted", &self.redactors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FrameFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only these component types.
    #[must_use]
    pub fn allow<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Never publish these component types.
    #[must_use]
    pub fn block<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.block.extend(types.into_iter().map(Into::into));
        self
    }

    /// Keep a component only if `predicate` accepts its entity and type id.
    /// Replaces any previous predicate.
    #[must_use]
    pub fn predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&EntityId, &str) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Rewrite every payload of `component` with `redactor`.
    #[must_use]
    pub fn redact<F>(mut self, component: impl Into<String>, redactor: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.redactors.insert(component.into(), Arc::new(redactor));
        self
    }

    fn keeps(&self, entity: &EntityId, component: &str) -> bool {
        if self.block.contains(component) {
            return false;
        }
        if self
            .allow
            .as_ref()
            .is_some_and(|allow| !allow.contains(component))
        {
            return false;
        }
        self.predicate
            .as_ref()
            .is_none_or(|predicate| predicate(entity, component))
    }

    /// Apply the filter. Entities are kept even if all their components are
    /// filtered out.
    #[must_use]
    pub fn apply(&self, mut frame: Frame) -> Frame {
        for entity in &mut frame.entities {
            let id = &entity.id;
            entity.components.retain(|component, _| self.keeps(id, component));
            for (component, payload) in &mut entity.components {
                if let Some(redactor) = self.redactors.get(component) {
                    *payload = redactor(payload);
                }
            }
        }
        frame
    }
}

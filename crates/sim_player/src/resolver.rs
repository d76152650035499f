//! Turning a system reference from a command into a system instance.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use sim_system::System;

type Factory = Arc<dyn Fn(&Value) -> anyhow::Result<Box<dyn System>> + Send + Sync>;

/// Errors raised while resolving a system reference.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Nothing is known under this reference.
    #[error("System not found: {0}")]
    NotFound(String),

    /// The factory rejected the options or failed to build the system.
    #[error("failed to construct system '{reference}': {source}")]
    Construct {
        reference: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Produces systems for `inject-system` commands.
///
/// Hosts decide what a reference means; the player never loads code itself.
pub trait SystemResolver: Send + Sync {
    /// Build a system from a reference and constructor options.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the reference is unknown or construction
    /// fails.
    fn resolve(&self, reference: &str, options: &Value) -> Result<Box<dyn System>, ResolveError>;
}

/// A [`SystemResolver`] backed by named factories.
#[derive(Clone, Default)]
pub struct SystemCatalog {
    factories: HashMap<String, Factory>,
}

impl std::fmt::Debug for SystemCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemCatalog")
            .field("references", &self.references())
            .finish()
    }
}

impl SystemCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `reference`, replacing any previous one.
    #[must_use]
    pub fn with<F>(mut self, reference: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<Box<dyn System>> + Send + Sync + 'static,
    {
        self.factories.insert(reference.into(), Arc::new(factory));
        self
    }

    /// Known references, sorted.
    #[must_use]
    pub fn references(&self) -> Vec<&str> {
        let mut references: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        references.sort_unstable();
        references
    }
}

impl SystemResolver for SystemCatalog {
    fn resolve(&self, reference: &str, options: &Value) -> Result<Box<dyn System>, ResolveError> {
        let factory = self
            .factories
            .get(reference)
            .ok_or_else(|| ResolveError::NotFound(reference.to_string()))?;
        factory(options).map_err(|source| ResolveError::Construct {
            reference: reference.to_string(),
            source,
        })
    }
}

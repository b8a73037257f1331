//! Resolution of external DTD subsets.
//!
//! The builder never reaches for the network or the filesystem on its own.
//! An external subset named in a DOCTYPE is only read when an
//! [`EntityResolver`] hands it over.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Failed to load entity '{system_id}': {message}")]
    LoadFailed { system_id: String, message: String },
}

/// Supplies the text of external entities, such as a DTD named by a DOCTYPE.
pub trait EntityResolver: Send + Sync + Debug {
    /// Returns the replacement text for the entity, or `Ok(None)` when this
    /// resolver does not handle it.
    fn resolve_entity(
        &self,
        public_id: Option<&str>,
        system_id: &str,
    ) -> Result<Option<String>, ResolveError>;

    /// A human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// Serves bundled DTD text from memory.
///
/// An entity is looked up by its public id first, then by its system id,
/// then by the last path segment of the system id, so
/// `http://example.org/dtd/config.dtd` can be served by an entry registered
/// as `config.dtd`.
#[derive(Debug, Default)]
pub struct InMemoryEntityResolver {
    entities: RwLock<HashMap<String, String>>,
}

impl InMemoryEntityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `text` under a public id, system id or file name.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::LoadFailed` if the internal lock is poisoned.
    pub fn add(&self, id: impl Into<String>, text: impl Into<String>) -> Result<(), ResolveError> {
        let id = id.into();
        let mut entities = self
            .entities
            .write()
            .map_err(|_| ResolveError::LoadFailed {
                system_id: id.clone(),
                message: "entity store lock poisoned".to_string(),
            })?;
        entities.insert(id, text.into());
        Ok(())
    }

    /// Builder-style [`add`](Self::add).
    pub fn with(self, id: impl Into<String>, text: impl Into<String>) -> Result<Self, ResolveError> {
        self.add(id, text)?;
        Ok(self)
    }

    /// Returns `None` if the lock is poisoned or the id is unknown.
    pub fn remove(&self, id: &str) -> Option<String> {
        self.entities.write().ok()?.remove(id)
    }

    /// Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.entities.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().map(|e| e.is_empty()).unwrap_or(true)
    }
}

impl EntityResolver for InMemoryEntityResolver {
    fn resolve_entity(
        &self,
        public_id: Option<&str>,
        system_id: &str,
    ) -> Result<Option<String>, ResolveError> {
        let entities = self
            .entities
            .read()
            .map_err(|_| ResolveError::LoadFailed {
                system_id: system_id.to_string(),
                message: "entity store lock poisoned".to_string(),
            })?;

        let file_name = system_id.rsplit(['/', '\\']).next().filter(|s| !s.is_empty());
        let found = public_id
            .and_then(|id| entities.get(id))
            .or_else(|| entities.get(system_id))
            .or_else(|| file_name.and_then(|name| entities.get(name)));
        Ok(found.cloned())
    }

    fn name(&self) -> &'static str {
        "InMemoryEntityResolver"
    }
}

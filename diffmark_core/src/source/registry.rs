//! Registry keeps track of the change sources searched on every pass.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::ChangeSource;
use crate::{Error, Result};

/// Change sources keyed by [`ChangeSource::id`].
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Arc<dyn ChangeSource>>,
}

impl SourceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source, replacing any earlier source with the same id.
    pub fn register<S>(&mut self, source: S)
    where
        S: ChangeSource + 'static,
    {
        self.register_shared(Arc::new(source));
    }

    /// Register an already shared source.
    pub fn register_shared(&mut self, source: Arc<dyn ChangeSource>) {
        self.sources.insert(source.id().to_owned(), source);
    }

    /// Remove a source, returning it when it was registered.
    pub fn remove(&mut self, id: &str) -> Option<Arc<dyn ChangeSource>> {
        self.sources.remove(id)
    }

    /// Retrieve a source by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceNotRegistered`] when the id is unknown.
    pub fn get(&self, id: &str) -> Result<Arc<dyn ChangeSource>> {
        self.sources
            .get(id)
            .cloned()
            .ok_or_else(|| Error::SourceNotRegistered {
                source_id: id.to_owned(),
            })
    }

    /// Registered identifiers in order.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.sources.keys().map(String::as_str)
    }

    /// Registered sources in id order.
    pub fn sources(&self) -> impl Iterator<Item = &Arc<dyn ChangeSource>> + '_ {
        self.sources.values()
    }

    /// Number of registered sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no source is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.ids().collect::<Vec<_>>())
            .finish()
    }
}

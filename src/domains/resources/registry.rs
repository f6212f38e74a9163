//! Resource registry - owned mapping of resource names to definitions.
//!
//! The registry is plain owned state held by the application context and
//! shared behind an `Arc`; there is no process-global. Routing consults it on
//! every request, so resources registered while the server is running are
//! live immediately.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::info;

use super::definition::ResourceDefinition;
use super::error::ResourceError;

/// Thread-safe registry of registered resources.
///
/// Reads happen on every dispatched request, writes only on registration, so
/// a read-write lock fits the access pattern.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: RwLock<HashMap<String, Arc<ResourceDefinition>>>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // The guarded map is structurally sound even if a holder panicked, so a
    // poisoned lock is recovered rather than propagated.
    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<ResourceDefinition>>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<ResourceDefinition>>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a definition under its name.
    ///
    /// The first registration of a name wins; a second one is rejected with
    /// [`ResourceError::DuplicateEndpoint`] and leaves the original in place.
    pub fn add(&self, definition: ResourceDefinition) -> Result<(), ResourceError> {
        let mut entries = self.write_entries();
        if entries.contains_key(&definition.name) {
            return Err(ResourceError::duplicate_endpoint(&definition.name));
        }

        info!(
            "Registering resource: {} -> {} (filter on {} fields)",
            definition.name,
            definition.source,
            definition.filter.len()
        );
        entries.insert(definition.name.clone(), Arc::new(definition));
        Ok(())
    }

    /// Look up a definition by resource name.
    pub fn get(&self, name: &str) -> Option<Arc<ResourceDefinition>> {
        self.read_entries().get(name).cloned()
    }

    /// Remove a definition, returning it if it was registered.
    ///
    /// Nothing calls this automatically; document deletion does not
    /// deregister endpoints.
    pub fn remove(&self, name: &str) -> Option<Arc<ResourceDefinition>> {
        self.write_entries().remove(name)
    }

    /// Whether a resource name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.read_entries().contains_key(name)
    }

    /// All registered resource names, sorted for stable listings.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_entries().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }
}

//! Server assembly and bootstrap.
//!
//! This module wires the application context together: the opened document
//! store, the owned resource registry, and the directory service operating on
//! both. It also runs the bootstrap sequence that registers the configured
//! base resources and one sub-resource per endpoint-bearing document already
//! present in the watched collections.
//!
//! The registration watcher is spawned from here as well; subscribe it
//! before bootstrap so no insert committed during startup is missed.

use std::sync::Arc;

use tracing::{info, instrument};

use super::config::Config;
use super::db::{DocumentStore, Filter};
use super::error::Result;
use crate::domains::resources::{DirectoryService, RegistrationWatcher, ResourceRegistry};

/// The assembled directory server context.
///
/// Cloning is cheap; all state is shared. The registry is owned here and
/// passed to every component that needs it, there is no process-global
/// routing table.
#[derive(Clone)]
pub struct ApiServer {
    /// Server configuration.
    config: Arc<Config>,

    /// Shared document store.
    store: Arc<DocumentStore>,

    /// Owned registry of registered resources.
    registry: Arc<ResourceRegistry>,

    /// Service handling registration and CRUD operations.
    service: DirectoryService,
}

impl ApiServer {
    /// Open the configured store and assemble the server context.
    pub fn new(config: Config) -> Result<Self> {
        let store = match &config.store.db_path {
            Some(path) => DocumentStore::open(path)?,
            None => DocumentStore::open_in_memory()?,
        };
        Ok(Self::with_store(config, store))
    }

    /// Assemble the server context over an already opened store.
    pub fn with_store(config: Config, store: DocumentStore) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(store);
        let registry = Arc::new(ResourceRegistry::new());
        let service = DirectoryService::new(store.clone(), registry.clone(), config.api.clone());

        Self {
            config,
            store,
            registry,
            service,
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    /// Get the server configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Get the shared document store.
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Get the owned resource registry.
    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// Get the directory service.
    pub fn service(&self) -> &DirectoryService {
        &self.service
    }

    /// Build a registration watcher subscribed to the store's insert events.
    ///
    /// Subscription happens at call time; only inserts committed afterwards
    /// are observed.
    pub fn watcher(&self) -> RegistrationWatcher {
        RegistrationWatcher::new(
            self.service.clone(),
            &self.config.domain.watched,
            self.store.events().subscribe(),
        )
    }

    /// Subscribe a registration watcher and run it as a background task.
    pub fn spawn_watcher(&self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.watcher().run())
    }

    /// Register the configured base resources, then one sub-resource per
    /// endpoint-bearing document already stored in the watched collections.
    ///
    /// Returns the number of dynamically registered endpoints. Any
    /// registration failure aborts startup.
    #[instrument(skip_all)]
    pub fn bootstrap(&self) -> Result<usize> {
        for base in &self.config.domain.base {
            self.service.register_resource(
                &base.name,
                &base.name,
                base.schema.clone(),
                &base.name,
                Filter::new(),
            )?;
        }
        info!("Registered {} base resource(s)", self.config.domain.base.len());

        let mut registered = 0;
        for watched in &self.config.domain.watched {
            let documents = self.store.find(&watched.collection, &Filter::new())?;
            registered += self
                .service
                .register_documents(&documents, &watched.family)?;
        }
        info!("Registered {} existing endpoint(s)", registered);

        Ok(registered)
    }
}

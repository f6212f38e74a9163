//! Resources domain module.
//!
//! This module handles everything about REST resources: their registration,
//! their document operations, and the watcher that derives new sub-resources
//! from inserted documents.
//!
//! ## Architecture
//!
//! - `definition.rs` - Immutable descriptor of one registered resource
//! - `registry.rs` - Owned name-to-definition map shared via the app context
//! - `service.rs` - Registration and CRUD operations
//! - `watcher.rs` - Insert-event consumer registering watched sub-resources
//! - `error.rs` - Resource-specific error types

mod definition;
mod error;
mod registry;
mod service;
mod watcher;

pub use definition::ResourceDefinition;
pub use error::ResourceError;
pub use registry::ResourceRegistry;
pub use service::{DirectoryService, ENDPOINT_FIELD, FIELDS_FIELD, ListPage, ListQuery};
pub use watcher::RegistrationWatcher;

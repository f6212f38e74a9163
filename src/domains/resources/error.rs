//! Resource-specific error types.

use thiserror::Error;

use crate::core::db::StoreError;
use crate::domains::validation::{Issues, SchemaError};

/// Errors that can occur during resource operations.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The requested resource is not registered.
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// An endpoint with this name is already registered.
    #[error("Duplicate endpoint: {0}")]
    DuplicateEndpoint(String),

    /// A seed document names an endpoint but lacks its family's key field.
    #[error("Endpoint '{endpoint}' seed document lacks key field '{key}'")]
    MissingKeyField { endpoint: String, key: String },

    /// No document with this id is visible through the resource.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// One or more fields failed schema validation.
    #[error("Document validation failed")]
    Validation(Issues),

    /// Field rules did not compile.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The document store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResourceError {
    /// Create a new "unknown resource" error.
    pub fn unknown_resource(name: impl Into<String>) -> Self {
        Self::UnknownResource(name.into())
    }

    /// Create a new "duplicate endpoint" error.
    pub fn duplicate_endpoint(name: impl Into<String>) -> Self {
        Self::DuplicateEndpoint(name.into())
    }

    /// Create a new "missing key field" error.
    pub fn missing_key_field(endpoint: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingKeyField {
            endpoint: endpoint.into(),
            key: key.into(),
        }
    }

    /// Create a new "document not found" error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::DocumentNotFound(id.into())
    }
}

//! Directory service implementation.
//!
//! The DirectoryService owns resource registration and the CRUD surface over
//! registered resources. Every operation resolves the resource through the
//! shared [`ResourceRegistry`] at call time, so endpoints registered while
//! the server is running are served without any rebuild step.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::core::config::{ApiConfig, ResourceFamily};
use crate::core::db::{Document, DocumentStore, Filter, document};
use crate::domains::validation::{DOCUMENT_ISSUE_KEY, FieldRules, Issues};

use super::definition::ResourceDefinition;
use super::error::ResourceError;
use super::registry::ResourceRegistry;

/// Field of a seed document that names the endpoint to create.
pub const ENDPOINT_FIELD: &str = "endpoint";

/// Field of a seed document holding extra field rules for its endpoint.
pub const FIELDS_FIELD: &str = "fields";

/// Listing query options.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Extra equality filter, intersected with the resource filter.
    pub where_filter: Option<Filter>,

    /// 1-based page number.
    pub page: Option<u32>,

    /// Requested page size, clamped to the configured limit.
    pub max_results: Option<u32>,
}

/// One page of a resource listing.
#[derive(Debug, Clone)]
pub struct ListPage {
    /// Documents of this page, in insertion order.
    pub items: Vec<Document>,

    /// Page number actually served.
    pub page: u32,

    /// Page size actually applied.
    pub max_results: u32,

    /// Total number of documents matching the query.
    pub total: usize,
}

/// Service for registering resources and operating on their documents.
#[derive(Clone)]
pub struct DirectoryService {
    store: Arc<DocumentStore>,
    registry: Arc<ResourceRegistry>,
    api: ApiConfig,
}

impl DirectoryService {
    /// Create a new DirectoryService over the given store and registry.
    pub fn new(store: Arc<DocumentStore>, registry: Arc<ResourceRegistry>, api: ApiConfig) -> Self {
        info!("Initializing DirectoryService");
        Self {
            store,
            registry,
            api,
        }
    }

    /// The shared registry this service registers into.
    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// The shared document store this service operates on.
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a resource with the given schema and filter.
    ///
    /// This creates a new endpoint for the resource, whereas documents are
    /// stored in the `source` collection and the filter is applied on reads.
    pub fn register_resource(
        &self,
        name: impl Into<String>,
        title: impl Into<String>,
        schema: FieldRules,
        source: impl Into<String>,
        filter: Filter,
    ) -> Result<(), ResourceError> {
        let definition = ResourceDefinition::build(name, title, schema, source, filter)?;
        self.registry.add(definition)
    }

    /// Register one sub-resource per endpoint-bearing document.
    ///
    /// Documents without a string `endpoint` field are skipped. For the rest,
    /// the family's base schema is merged with the document's `fields`
    /// entries (document wins on conflicts, each document starts from a fresh
    /// copy of the base) and the endpoint is filtered to documents whose
    /// family key equals the seed document's value.
    ///
    /// Returns the number of endpoints registered.
    #[instrument(skip_all, fields(source = %family.source, key = %family.key))]
    pub fn register_documents(
        &self,
        documents: &[Document],
        family: &ResourceFamily,
    ) -> Result<usize, ResourceError> {
        let mut registered = 0;

        for seed in documents {
            let Some(Value::String(endpoint)) = seed.get(ENDPOINT_FIELD) else {
                continue;
            };

            let Some(key_value) = seed.get(&family.key) else {
                return Err(ResourceError::missing_key_field(endpoint, &family.key));
            };

            let schema = merge_schema(&family.schema, seed, endpoint);
            let mut filter = Filter::new();
            filter.insert(family.key.clone(), key_value.clone());

            self.register_resource(endpoint, endpoint, schema, &family.source, filter)?;
            registered += 1;
        }

        Ok(registered)
    }

    // ========================================================================
    // CRUD surface
    // ========================================================================

    fn resource(&self, name: &str) -> Result<Arc<ResourceDefinition>, ResourceError> {
        self.registry
            .get(name)
            .ok_or_else(|| ResourceError::unknown_resource(name))
    }

    /// List documents visible through `resource`, paginated.
    pub fn find(&self, resource: &str, query: &ListQuery) -> Result<ListPage, ResourceError> {
        let definition = self.resource(resource)?;
        let page = query.page.unwrap_or(1).max(1);
        let max_results = query
            .max_results
            .unwrap_or(self.api.pagination_default)
            .clamp(1, self.api.pagination_limit);

        let Some(filter) = intersect_filters(&definition.filter, query.where_filter.as_ref())
        else {
            // The caller's filter contradicts the resource filter; nothing
            // can match.
            return Ok(ListPage {
                items: Vec::new(),
                page,
                max_results,
                total: 0,
            });
        };

        let (items, total) = self
            .store
            .find_page(&definition.source, &filter, page, max_results)?;
        Ok(ListPage {
            items,
            page,
            max_results,
            total,
        })
    }

    /// Fetch a single document by id through `resource`.
    ///
    /// A document outside the resource filter is not found through this
    /// resource, even when the id exists in the source collection.
    pub fn find_item(&self, resource: &str, id: &str) -> Result<Document, ResourceError> {
        let definition = self.resource(resource)?;
        self.store
            .find_by_id(&definition.source, &definition.filter, id)?
            .ok_or_else(|| ResourceError::not_found(id))
    }

    /// Validate and insert a batch of documents through `resource`.
    ///
    /// Validation is all-or-nothing: the first failing document aborts the
    /// batch with its issue map and nothing is stored.
    #[instrument(skip_all, fields(resource = %resource))]
    pub fn insert(
        &self,
        resource: &str,
        documents: Vec<Value>,
    ) -> Result<Vec<Document>, ResourceError> {
        let definition = self.resource(resource)?;

        let mut bodies = Vec::with_capacity(documents.len());
        for value in documents {
            definition
                .validator
                .validate_document(&value)
                .map_err(ResourceError::Validation)?;
            bodies.push(require_object(value)?);
        }

        let stored = self.store.insert_many(&definition.source, bodies)?;
        info!(
            "Inserted {} document(s) through resource '{}'",
            stored.len(),
            resource
        );
        Ok(stored)
    }

    /// Replace a document's body, keeping `_id` and `_created`.
    pub fn replace(
        &self,
        resource: &str,
        id: &str,
        document: Value,
    ) -> Result<Document, ResourceError> {
        let definition = self.resource(resource)?;
        definition
            .validator
            .validate_document(&document)
            .map_err(ResourceError::Validation)?;
        let body = require_object(document)?;

        self.store
            .replace(&definition.source, &definition.filter, id, body)?
            .ok_or_else(|| ResourceError::not_found(id))
    }

    /// Apply a partial update to a stored document.
    ///
    /// Changes are validated against the relaxed schema variant, then merged
    /// over the stored body.
    pub fn patch(
        &self,
        resource: &str,
        id: &str,
        changes: Value,
    ) -> Result<Document, ResourceError> {
        let definition = self.resource(resource)?;
        definition
            .validator
            .validate_changes(&changes)
            .map_err(ResourceError::Validation)?;
        let changes = require_object(changes)?;

        let existing = self.find_item(resource, id)?;
        let mut body = document::strip_metadata(existing);
        for (field, value) in changes {
            body.insert(field, value);
        }

        self.store
            .replace(&definition.source, &definition.filter, id, body)?
            .ok_or_else(|| ResourceError::not_found(id))
    }

    /// Delete a single document through `resource`.
    pub fn delete_item(&self, resource: &str, id: &str) -> Result<(), ResourceError> {
        let definition = self.resource(resource)?;
        if self
            .store
            .delete_by_id(&definition.source, &definition.filter, id)?
        {
            Ok(())
        } else {
            Err(ResourceError::not_found(id))
        }
    }

    /// Delete every document visible through `resource`.
    ///
    /// Other resources backed by the same source collection but a different
    /// filter keep their documents.
    #[instrument(skip_all, fields(resource = %resource))]
    pub fn delete_all(&self, resource: &str) -> Result<usize, ResourceError> {
        let definition = self.resource(resource)?;
        let deleted = self
            .store
            .delete_matching(&definition.source, &definition.filter)?;
        info!(
            "Deleted {} document(s) through resource '{}'",
            deleted, resource
        );
        Ok(deleted)
    }

    // ========================================================================
    // Direct helpers
    // ========================================================================

    /// Add a new document to the given resource.
    ///
    /// Runs the same validation, persistence, and event pipeline as an HTTP
    /// insert; intended for tooling and tests.
    pub fn add_document(
        &self,
        resource: &str,
        document: Value,
    ) -> Result<Document, ResourceError> {
        let mut stored = self.insert(resource, vec![document])?;
        stored.pop().ok_or_else(|| {
            let mut issues = Issues::new();
            issues.insert(
                DOCUMENT_ISSUE_KEY.to_string(),
                "nothing was stored".to_string(),
            );
            ResourceError::Validation(issues)
        })
    }

    /// Delete all documents of the given resource.
    pub fn delete_documents(&self, resource: &str) -> Result<usize, ResourceError> {
        self.delete_all(resource)
    }
}

/// Merge a seed document's `fields` entries over the family base schema.
///
/// Later keys overwrite same-named earlier keys; each call starts from a
/// fresh copy of the base so one document's fields never leak into another's
/// endpoint.
fn merge_schema(base: &FieldRules, seed: &Document, endpoint: &str) -> FieldRules {
    let mut schema = base.clone();
    match seed.get(FIELDS_FIELD) {
        Some(Value::Object(fields)) => {
            for (field, rules) in fields {
                if schema.insert(field.clone(), rules.clone()).is_some() {
                    debug!("Field '{field}' of endpoint '{endpoint}' shadows the family rule");
                }
            }
        }
        Some(_) => {
            debug!("Ignoring non-object fields entry on endpoint '{endpoint}'");
        }
        None => {}
    }
    schema
}

/// Intersect the resource filter with an optional caller filter.
///
/// Both are equality filters, so the intersection is their union, except
/// that conflicting values for the same field can never match: that case
/// yields `None`.
fn intersect_filters(resource: &Filter, extra: Option<&Filter>) -> Option<Filter> {
    let mut combined = resource.clone();
    if let Some(extra) = extra {
        for (field, value) in extra {
            match combined.get(field) {
                Some(existing) if existing != value => return None,
                _ => {
                    combined.insert(field.clone(), value.clone());
                }
            }
        }
    }
    Some(combined)
}

fn require_object(value: Value) -> Result<Document, ResourceError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => {
            let mut issues = Issues::new();
            issues.insert(
                DOCUMENT_ISSUE_KEY.to_string(),
                "must be a JSON object".to_string(),
            );
            Err(ResourceError::Validation(issues))
        }
    }
}

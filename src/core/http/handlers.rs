//! Request handlers for the REST surface.
//!
//! Listings return `{"_items": [...], "_meta": {...}}`, single documents are
//! returned as-is, and deletes answer 204 with an empty body.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::core::db::Filter;
use crate::core::server::ApiServer;
use crate::domains::resources::{ListPage, ListQuery};

use super::error::ApiError;

/// Query parameters accepted by resource listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// JSON object of field equality conditions.
    #[serde(rename = "where")]
    pub where_filter: Option<String>,

    /// 1-based page number.
    pub page: Option<u32>,

    /// Requested page size.
    pub max_results: Option<u32>,
}

impl ListParams {
    fn into_query(self) -> Result<ListQuery, ApiError> {
        let where_filter = match self.where_filter {
            Some(raw) => Some(parse_where(&raw)?),
            None => None,
        };
        Ok(ListQuery {
            where_filter,
            page: self.page,
            max_results: self.max_results,
        })
    }
}

fn parse_where(raw: &str) -> Result<Filter, ApiError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| ApiError::bad_request(format!("Invalid where clause: {err}")))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::bad_request(
            "Invalid where clause: expected a JSON object",
        )),
    }
}

fn listing_body(page: ListPage) -> Value {
    json!({
        "_items": page.items,
        "_meta": {
            "page": page.page,
            "max_results": page.max_results,
            "total": page.total,
        }
    })
}

/// Home document listing every registered resource as a child link.
pub async fn home(State(server): State<ApiServer>) -> Json<Value> {
    let prefix = &server.config().server.url_prefix;
    let children: Vec<Value> = server
        .registry()
        .names()
        .into_iter()
        .map(|name| {
            let href = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            json!({"href": href, "title": name})
        })
        .collect();
    Json(json!({"_links": {"child": children}}))
}

/// Liveness probe.
pub async fn health(State(server): State<ApiServer>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "server": server.name(),
        "version": server.version(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Fallback for paths that match no resource route.
pub async fn not_found() -> ApiError {
    ApiError::not_found("The requested URL was not found on the server")
}

pub async fn list_resource(
    State(server): State<ApiServer>,
    Path(resource): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let query = params.into_query()?;
    let page = server.service().find(&resource, &query)?;
    Ok(Json(listing_body(page)))
}

/// Accepts a single document or an array of documents.
pub async fn post_resource(
    State(server): State<ApiServer>,
    Path(resource): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let batch = matches!(body, Value::Array(_));
    let documents = match body {
        Value::Array(items) => items,
        single => vec![single],
    };

    let mut stored = server.service().insert(&resource, documents)?;
    let body = if batch {
        json!({"_status": "OK", "_items": stored})
    } else {
        match stored.pop() {
            Some(document) => Value::Object(document),
            None => json!({"_status": "OK"}),
        }
    };
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn delete_resource(
    State(server): State<ApiServer>,
    Path(resource): Path<String>,
) -> Result<StatusCode, ApiError> {
    server.service().delete_all(&resource)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_item(
    State(server): State<ApiServer>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let document = server.service().find_item(&resource, &id)?;
    Ok(Json(Value::Object(document)))
}

pub async fn put_item(
    State(server): State<ApiServer>,
    Path((resource, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let document = server.service().replace(&resource, &id, body)?;
    Ok(Json(Value::Object(document)))
}

pub async fn patch_item(
    State(server): State<ApiServer>,
    Path((resource, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let document = server.service().patch(&resource, &id, body)?;
    Ok(Json(Value::Object(document)))
}

pub async fn delete_item(
    State(server): State<ApiServer>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    server.service().delete_item(&resource, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

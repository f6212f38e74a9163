//! HTTP transport for the directory server.
//!
//! REST surface over axum. Every registered resource is served under the
//! configured URL prefix with the conventional verb mapping:
//!
//! - `GET /{resource}` - paginated, filterable listing
//! - `POST /{resource}` - insert one document or a batch
//! - `DELETE /{resource}` - bulk delete within the resource's filter
//! - `GET|PUT|PATCH|DELETE /{resource}/{id}` - single-document operations
//!
//! Routes are matched dynamically: the `{resource}` segment is resolved
//! against the registry per request, so endpoints registered at runtime
//! become routable without rebuilding the router.

pub mod error;
pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::config::HttpConfig;
use super::error::{Error, Result};
use super::server::ApiServer;

pub use error::ApiError;

/// HTTP transport handler.
pub struct HttpTransport {
    config: HttpConfig,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given config.
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }

    /// Get the bind address.
    pub fn address(&self) -> String {
        self.config.bind_addr()
    }

    /// Run the HTTP transport until the process is stopped.
    pub async fn run(self, server: ApiServer) -> Result<()> {
        let addr = self.address();
        let prefix = server.config().server.url_prefix.clone();
        let app = build_router(server, self.config.enable_cors);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|err| Error::internal(format!("Failed to bind {addr}: {err}")))?;

        let cors_status = if self.config.enable_cors {
            "enabled"
        } else {
            "disabled"
        };
        info!(
            "Ready - listening on {} (REST over HTTP, CORS {})",
            addr, cors_status
        );
        let base = if prefix.is_empty() {
            String::new()
        } else {
            format!("/{prefix}")
        };
        info!("  → Resources: {}/{{resource}}", base);
        info!("  → Health:    GET /health");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Assemble the application router around a server instance.
pub fn build_router(server: ApiServer, enable_cors: bool) -> Router {
    let resources = Router::new()
        .route(
            "/{resource}",
            get(handlers::list_resource)
                .post(handlers::post_resource)
                .delete(handlers::delete_resource),
        )
        .route(
            "/{resource}/{id}",
            get(handlers::get_item)
                .put(handlers::put_item)
                .patch(handlers::patch_item)
                .delete(handlers::delete_item),
        );

    let prefix = server.config().server.url_prefix.clone();
    let app = Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health));
    let app = if prefix.is_empty() {
        app.merge(resources)
    } else {
        app.nest(&format!("/{prefix}"), resources)
    };
    let mut app = app.fallback(handlers::not_found).with_state(server);

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app.layer(TraceLayer::new_for_http())
}

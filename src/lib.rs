//! Community Directory Server Library
//!
//! This crate provides a REST directory server where the set of served
//! resources grows at runtime: documents inserted into watched collections
//! can declare new endpoints, which become routable sub-resources backed by
//! the same store.
//!
//! # Architecture
//!
//! The server is organized into the following modules:
//!
//! - **core**: Core infrastructure including configuration, error handling, the
//!   document store, and the HTTP transport
//! - **domains**: Business logic organized by bounded contexts
//!   - **resources**: Resource definitions, the registry, CRUD operations, and
//!     the registration watcher
//!   - **validation**: Schema compilation and document validation
//!
//! # Example
//!
//! ```rust,no_run
//! use community_directory_server::{core::ApiServer, core::Config, core::HttpTransport};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let server = ApiServer::new(config.clone())?;
//!     let _watcher = server.spawn_watcher();
//!     server.bootstrap()?;
//!     HttpTransport::new(config.http.clone()).run(server).await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use crate::core::{ApiServer, Config, Error, Result};

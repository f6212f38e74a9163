//! Core module containing shared infrastructure components.
//!
//! This module provides the foundational building blocks for the directory
//! server, including error handling, configuration, the document store,
//! server lifecycle management, and the HTTP transport.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
pub use http::HttpTransport;
pub use server::ApiServer;

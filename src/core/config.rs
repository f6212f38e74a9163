//! Configuration management for the directory server.
//!
//! This module provides a centralized configuration structure that can be
//! populated from environment variables, a domain file, or defaults.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use tracing::{info, warn};

/// Main configuration structure for the directory server.
///
/// This struct contains all configurable aspects of the server, organized
/// by concern for clarity and maintainability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// HTTP listener configuration.
    pub http: HttpConfig,

    /// Document store configuration.
    pub store: StoreConfig,

    /// API behavior configuration.
    pub api: ApiConfig,

    /// Resource domain: base collections and watched families.
    pub domain: DomainConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported in the home document.
    pub name: String,

    /// The version of the server.
    pub version: String,

    /// Path prefix under which resources are served (empty for root).
    pub url_prefix: String,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Host address to bind to.
    pub host: String,

    /// Port number to listen on.
    pub port: u16,

    /// Enable CORS for browser clients.
    pub enable_cors: bool,
}

impl HttpConfig {
    /// The socket address string this configuration binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve the listener binding from the environment.
    ///
    /// `PORT` set binds all interfaces on that port (platform-injected port
    /// convention); unset falls back to loopback on 5000.
    pub fn from_env() -> Self {
        let enable_cors = std::env::var("DIRECTORY_HTTP_CORS")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);

        match std::env::var("PORT") {
            Ok(raw) => match raw.parse::<u16>() {
                Ok(port) => Self {
                    host: "0.0.0.0".to_string(),
                    port,
                    enable_cors,
                },
                Err(_) => {
                    warn!("Ignoring unparsable PORT value: {raw}");
                    Self {
                        enable_cors,
                        ..Self::default()
                    }
                }
            },
            Err(_) => Self {
                enable_cors,
                ..Self::default()
            },
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            enable_cors: true,
        }
    }
}

/// Document store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file location. `None` keeps documents in memory.
    pub db_path: Option<PathBuf>,
}

/// API behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Page size applied when the client does not ask for one.
    pub pagination_default: u32,

    /// Upper bound on client-requested page sizes.
    pub pagination_limit: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            pagination_default: 25,
            pagination_limit: 50,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,

    /// Whether to include timestamps in log output.
    pub with_timestamps: bool,
}

// ============================================================================
// Resource domain
// ============================================================================

/// The resource domain: which collections exist and how sub-resources are
/// derived from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Collections exposed directly as resources.
    pub base: Vec<BaseResource>,

    /// Watched collections, each spawning one sub-resource per document that
    /// carries an `endpoint` field.
    pub watched: Vec<WatchedCollection>,
}

/// A collection exposed directly under its own name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseResource {
    /// Resource and collection name.
    pub name: String,

    /// Field rules for documents of this collection.
    pub schema: Map<String, Value>,
}

/// A collection whose documents seed dynamically registered sub-resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedCollection {
    /// Collection to watch for endpoint-bearing documents.
    pub collection: String,

    /// Template the spawned sub-resources are built from.
    pub family: ResourceFamily,
}

/// Template for a class of dynamically generated sub-resources.
///
/// Every endpoint of the family serves documents of `source`, restricted to
/// those whose `key` field equals the seeding document's value, and validates
/// writes against `schema` merged with the seeding document's extra fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceFamily {
    /// Base field rules shared by every endpoint of the family.
    pub schema: Map<String, Value>,

    /// Backing collection the endpoints read from and write to.
    pub source: String,

    /// Field whose per-document value becomes the endpoint filter.
    pub key: String,
}

impl DomainConfig {
    /// Load a domain from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path).map_err(|err| err.to_string())?;
        serde_json::from_str(&raw).map_err(|err| err.to_string())
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            base: vec![
                BaseResource {
                    name: "services".to_string(),
                    schema: object(json!({
                        "endpoint": {"type": "string"},
                        "service": {"type": "string", "required": true},
                        "fields": {"type": "object", "keyschema": {"type": "object"}}
                    })),
                },
                BaseResource {
                    name: "facilities".to_string(),
                    schema: object(json!({
                        "endpoint": {"type": "string"},
                        "region": {"type": "string", "required": true},
                        "name": {"type": "string"},
                        "fields": {"type": "object", "keyschema": {"type": "object"}}
                    })),
                },
                BaseResource {
                    name: "requests".to_string(),
                    schema: object(json!({
                        "service": {"type": "string", "required": true},
                        "details": {"type": "object"}
                    })),
                },
            ],
            watched: vec![
                WatchedCollection {
                    collection: "services".to_string(),
                    family: ResourceFamily {
                        schema: object(json!({
                            "service": {"type": "string"},
                            "details": {"type": "object"}
                        })),
                        source: "requests".to_string(),
                        key: "service".to_string(),
                    },
                },
                WatchedCollection {
                    collection: "facilities".to_string(),
                    family: ResourceFamily {
                        schema: object(json!({
                            "region": {"type": "string"},
                            "name": {"type": "string"}
                        })),
                        source: "facilities".to_string(),
                        key: "region".to_string(),
                    },
                },
            ],
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "community-directory".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                url_prefix: "v1".to_string(),
            },
            http: HttpConfig::default(),
            store: StoreConfig::default(),
            api: ApiConfig::default(),
            domain: DomainConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                with_timestamps: true,
            },
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Scalar settings use the `DIRECTORY_` prefix; the listener binding
    /// additionally honors the bare `PORT` convention (see
    /// [`HttpConfig::from_env`]).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("DIRECTORY_SERVER_NAME") {
            config.server.name = name;
        }

        if let Ok(prefix) = std::env::var("DIRECTORY_URL_PREFIX") {
            config.server.url_prefix = prefix.trim_matches('/').to_string();
        }

        if let Ok(level) = std::env::var("DIRECTORY_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Ok(db_path) = std::env::var("DIRECTORY_DB_PATH") {
            config.store.db_path = Some(PathBuf::from(db_path));
        } else {
            warn!("DIRECTORY_DB_PATH not set - documents are kept in memory only");
        }

        config.http = HttpConfig::from_env();

        if let Ok(domain_path) = std::env::var("DIRECTORY_DOMAIN_PATH") {
            let path = PathBuf::from(domain_path);
            match DomainConfig::from_file(&path) {
                Ok(domain) => {
                    info!("Domain loaded from {}", path.display());
                    config.domain = domain;
                }
                Err(err) => {
                    warn!("Keeping built-in domain, {} unusable: {err}", path.display());
                }
            }
        }

        config
    }
}

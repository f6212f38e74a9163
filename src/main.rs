//! Directory Server Entry Point
//!
//! This is the main entry point for the directory server. It initializes
//! logging, loads configuration, registers the configured resources, and
//! serves the REST surface over HTTP.

use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use community_directory_server::core::config::LoggingConfig;
use community_directory_server::core::{ApiServer, Config, HttpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment
    let config = Config::from_env();

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting {} v{}", config.server.name, config.server.version);

    let server = ApiServer::new(config.clone())?;

    // The watcher must be subscribed before bootstrap; inserts made while
    // the server starts up would otherwise miss their registration pass.
    let _watcher = server.spawn_watcher();

    server.bootstrap()?;
    info!("Server initialized");

    let transport = HttpTransport::new(config.http.clone());
    transport.run(server).await?;

    info!("Server shutting down");

    Ok(())
}

/// Initialize the logging subsystem.
///
/// Configures tracing with the specified log level and format.
fn init_logging(config: &LoggingConfig) {
    let level = match config.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    if config.with_timestamps {
        builder.init();
    } else {
        builder.without_time().init();
    }
}

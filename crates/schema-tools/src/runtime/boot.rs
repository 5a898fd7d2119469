//! Boot: logging init, config load, directory setup, toolbox creation.

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::ToolsConfig;
use crate::toolbox::Toolbox;

/// Initialise the tracing / logging subsystem.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "schema_tools=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load and validate config, create the writable directories,
/// and build the toolbox.
pub fn boot() -> Result<Toolbox, Box<dyn std::error::Error>> {
    info!("Starting schema-tools v{}", env!("CARGO_PKG_VERSION"));

    let config = ToolsConfig::load()?;
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;
    info!("Project root: {}", config.project_root.display());
    info!(
        "Limits: batch_size={}, command_timeout={}s, max_search_results={}",
        config.batch_size, config.command_timeout_secs, config.max_search_results
    );

    prepare_directories(&config)?;

    let toolbox = Toolbox::new(config);
    info!(
        "Toolbox ready: {} tools, commands allowed: {}",
        Toolbox::TOOL_NAMES.len(),
        toolbox.commands().command_types().join(", ")
    );
    Ok(toolbox)
}

/// Create every write root so the first write never fails on a missing parent.
pub fn prepare_directories(config: &ToolsConfig) -> std::io::Result<()> {
    for dir in config.write_roots() {
        std::fs::create_dir_all(&dir)?;
        info!("Writable directory: {}", dir.display());
    }
    Ok(())
}

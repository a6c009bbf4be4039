//! Texnouz smart charging - CLI server
//!
//! Headless charging profile service suitable for a systemd unit, a container
//! or a standalone process.
//!
//! ```sh
//! # Default config (~/.config/texnouz-smart-charging/config.toml)
//! smart-charging-service
//!
//! # Custom config path and backend
//! smart-charging-service --config /etc/smart-charging/config.toml --backend document
//!
//! # Validate config without starting
//! smart-charging-service --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use texnouz_smart_charging::config::{AppConfig, StorageBackend};
use texnouz_smart_charging::server::{init_tracing, ServerHandle, ServerOptions};

/// Texnouz smart charging: charging profiles and composite schedules for OCPP charge points.
#[derive(Parser, Debug)]
#[command(
    name = "smart-charging-service",
    version,
    about = "Charging profile store and composite schedule service",
    long_about = "Texnouz smart charging - REST API for storing OCPP charging profiles \
                  and resolving composite schedules.\n\n\
                  Default config: ~/.config/texnouz-smart-charging/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "SMART_CHARGING_CONFIG")]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Override the storage backend (memory, document, database).
    #[arg(long)]
    backend: Option<StorageBackend>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .unwrap_or_else(texnouz_smart_charging::default_config_path);

    let (mut config, load_error) = match AppConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => {
            let mut cfg = AppConfig::default();
            cfg.apply_env_overrides();
            (cfg, Some(e))
        }
    };

    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    init_tracing(&config);

    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => {
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
        }
    }

    if let Some(port) = cli.api_port {
        info!("CLI override: api_port = {}", port);
        config.server.api_port = port;
    }
    if let Some(backend) = cli.backend {
        info!("CLI override: backend = {}", backend.as_str());
        config.storage.backend = backend;
    }

    if cli.check {
        println!("Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   API address : {}:{}", config.server.api_host, config.server.api_port);
        println!("   Backend     : {}", config.storage.backend.as_str());
        match config.storage.backend {
            StorageBackend::Database => {
                println!("   Database    : {}", config.database.connection_url())
            }
            StorageBackend::Document => {
                println!("   Documents   : {}", config.storage.document_root.display())
            }
            StorageBackend::Memory => {}
        }
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
    })
    .await?;

    handle.install_signal_handler();
    info!("Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}

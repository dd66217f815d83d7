//! Texnouz OCPI node
//!
//! ```sh
//! # Default config (~/.config/texnouz-ocpi/config.toml, or $OCPI_CONFIG)
//! ocpi-service
//!
//! # Custom config path and port
//! ocpi-service --config /etc/texnouz-ocpi/config.toml --port 8443
//!
//! # Validate config without starting
//! ocpi-service --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use texnouz_ocpi::config::{resolve_config_path, AppConfig};
use texnouz_ocpi::server::{init_tracing, ServerHandle, ServerOptions};

/// OCPI federation node: credentials handshake, module sync, remote commands.
#[derive(Parser, Debug)]
#[command(name = "ocpi-service", version, about)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "OCPI_CONFIG")]
    config: Option<PathBuf>,

    /// Override the HTTP listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

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

    let config_path = resolve_config_path(cli.config);
    let mut config = match AppConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", config_path.display(), e);
            return Err(e.into());
        }
    };

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    if cli.check {
        println!("✅ Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   Listen      : {}", config.address());
        println!("   Base URL    : {}", config.platform.base_url);
        println!("   Versions    : {}", config.platform.versions.join(", "));
        println!("   Database    : {}", config.database.url);
        println!("   Remotes     : {}", config.remotes.len());
        return Ok(());
    }

    init_tracing(&config);
    info!("Configuration loaded from {}", config_path.display());

    let handle = match ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
    })
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start: {}", e);
            return Err(e);
        }
    };

    handle.install_signal_handler();
    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}

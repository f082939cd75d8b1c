//! Satchel CLI - operate on persisted sessions
//!
//! Inspect stored payloads, sweep expired sessions and manage configuration

use anyhow::Context;
use clap::{Parser, Subcommand};
use satchel_core::{
    init_logging, log_operation_error, log_operation_start, log_operation_success, not_found_error,
    performance, HandlerDriver, SatchelConfig,
};
use satchel_session::{codec_for, FileHandler, SessionHandler, SessionManager};
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "satchel")]
#[command(about = "Inspect and maintain persisted sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a stored session and print it as JSON
    Inspect {
        /// Session identifier
        id: String,
    },

    /// Remove sessions idle for longer than the configured lifetime
    Gc,

    /// Show storage statistics for the file driver
    Stats,

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;

    let mut logging_config = config.logging.clone();
    if cli.verbose {
        logging_config.level = "debug".to_string();
    }
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting Satchel CLI v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Inspect { id } => handle_inspect(&id, &config)?,
        Commands::Gc => handle_gc(config)?,
        Commands::Stats => handle_stats(&config)?,
        Commands::Config {
            show,
            init,
            validate,
        } => handle_config(show, init, validate, cli.config.as_ref())?,
    }

    Ok(())
}

fn load_config(config_path: Option<&PathBuf>) -> anyhow::Result<SatchelConfig> {
    if let Some(path) = config_path {
        return SatchelConfig::from_file(path)
            .with_context(|| format!("Loading configuration from {}", path.display()));
    }

    let default_paths = [
        dirs::config_dir().map(|d| d.join("satchel").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".satchel").join("config.toml")),
        Some(PathBuf::from("satchel.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            return SatchelConfig::from_file(path)
                .with_context(|| format!("Loading configuration from {}", path.display()));
        }
    }

    Ok(SatchelConfig::default())
}

fn file_handler(config: &SatchelConfig) -> anyhow::Result<FileHandler> {
    if config.session.driver != HandlerDriver::File {
        anyhow::bail!(
            "This command needs the file driver, but session.driver is {:?}",
            config.session.driver
        );
    }
    Ok(FileHandler::new(
        config.session.files_path(),
        config.session.lifetime_secs(),
    )?)
}

fn handle_inspect(id: &str, config: &SatchelConfig) -> anyhow::Result<()> {
    log_operation_start!("inspect", session_id = %id);

    let handler = file_handler(config)?;
    let payload = handler.read(id).map_err(|e| {
        log_operation_error!("inspect", e, session_id = %id);
        e
    })?;

    if payload.is_empty() {
        return Err(not_found_error!(format!("session {}", id), "cli").into());
    }

    let attributes = codec_for(config.session.serialization).decode(&payload);
    println!("{}", serde_json::to_string_pretty(&Value::Object(attributes))?);

    log_operation_success!("inspect", session_id = %id, bytes = payload.len());
    Ok(())
}

fn handle_gc(config: SatchelConfig) -> anyhow::Result<()> {
    log_operation_start!("gc", driver = ?config.session.driver);

    let manager = SessionManager::new(config)?;
    let removed = performance::measure_sync("gc", || manager.force_collect_garbage())?;

    println!("Removed {} expired session(s)", removed);
    log_operation_success!("gc", removed = removed);
    Ok(())
}

fn handle_stats(config: &SatchelConfig) -> anyhow::Result<()> {
    let stats = file_handler(config)?.stats()?;
    println!("{}", stats.summary());
    Ok(())
}

fn handle_config(
    show: bool,
    init: bool,
    validate: bool,
    config_path: Option<&PathBuf>,
) -> anyhow::Result<()> {
    if init {
        let config = SatchelConfig::default();
        let config_path = match config_path {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        config.save_to_file(&config_path)?;
        println!("Configuration initialized at: {}", config_path.display());
    }

    if show {
        let config = load_config(config_path)?;
        println!("{}", toml::to_string_pretty(&config)?);
    }

    if validate {
        let config = load_config(config_path)?;
        match config.validate() {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => {
                println!("Configuration validation failed: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}

fn default_config_path() -> anyhow::Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
        .context("Cannot determine a configuration directory")?;
    Ok(config_dir.join("satchel").join("config.toml"))
}

//! rutificador - Chilean RUT validation command-line tool
//!
//! Configuration is loaded before logging is initialized so the file's
//! `[logging] level` can take effect; the resolved source is logged right
//! after.

use anyhow::{Context, Result};
use clap::Parser;
use rutificador_cli::{env_filter, run, Cli};
use rutificador_core::config::resolve_config_path;
use rutificador_core::TomlConfig;
use std::io;
use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = TomlConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(cli.log_level.as_deref(), &config.logging.level)?)
        .with_writer(io::stderr)
        .init();

    info!(
        "Starting rutificador v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match resolve_config_path(cli.config.as_deref()) {
        Some(path) if path.exists() => info!("Configuration: {}", path.display()),
        _ => info!("Configuration: built-in defaults"),
    }

    let stdin = io::stdin();
    let code = run(
        &cli,
        &config,
        stdin.lock(),
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
    )?;

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

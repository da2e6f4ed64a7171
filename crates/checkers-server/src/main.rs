//! Networked checkers server: entry point.
//!
//! Pairs clients that ask for a game, runs a per-session clock, and relays
//! moves between the two players of each session.  The server does not run
//! the rule engine; each client validates moves against its own board.
//!
//! # Usage
//!
//! ```text
//! checkers-server [OPTIONS]
//!
//! Options:
//!   --config    <PATH>   TOML config file [default: checkers-server.toml if present]
//!   --bind      <ADDR>   IP address to listen on [default: 0.0.0.0]
//!   --port      <PORT>   TCP port [default: 5000]
//!   --countdown <SECS>   Seconds between pairing and game start [default: 5]
//!   --write-config <PATH>  Write the effective config to PATH and exit
//!   --no-log             Disable all log output
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable              | Flag          |
//! |-----------------------|---------------|
//! | `CHECKERS_CONFIG`     | `--config`    |
//! | `CHECKERS_BIND`       | `--bind`      |
//! | `CHECKERS_PORT`       | `--port`      |
//! | `CHECKERS_COUNTDOWN`  | `--countdown` |
//!
//! Flags and variables take precedence over the config file.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use checkers_server::application::Coordinator;
use checkers_server::infrastructure::run_server;
use checkers_server::infrastructure::storage::config::{load_config, save_config, ServerConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Networked checkers matchmaking and relay server.
#[derive(Debug, Parser)]
#[command(
    name = "checkers-server",
    about = "Matchmaking, session clock, and move relay server for networked checkers",
    version
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, env = "CHECKERS_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the listener to.
    #[arg(long, env = "CHECKERS_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "CHECKERS_PORT")]
    port: Option<u16>,

    /// Countdown in seconds between pairing and `GAME_STARTED`.
    #[arg(long, env = "CHECKERS_COUNTDOWN")]
    countdown: Option<u64>,

    /// Write the effective configuration to this path and exit.
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// Disable logging entirely.
    #[arg(long)]
    no_log: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded file config.
    fn apply_to(&self, mut config: ServerConfig) -> ServerConfig {
        if let Some(bind) = &self.bind {
            config.network.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(countdown) = self.countdown {
            config.session.countdown_secs = countdown;
        }
        config
    }
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level; `--no-log` silences everything.
fn init_logging(no_log: bool, level: &str) {
    let filter = if no_log {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    let config = cli.apply_to(file_config);

    if let Some(path) = &cli.write_config {
        save_config(path, &config)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    init_logging(cli.no_log, &config.log_level);

    let addr = config.network.bind_addr()?;
    let timing = config.session.timing()?;
    info!(
        "checkers server starting: addr={addr}, countdown={:?}, tick={:?}",
        timing.countdown, timing.tick
    );

    let coordinator = Arc::new(Coordinator::new(timing));

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    run_server(addr, coordinator, running).await?;

    info!("checkers server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_leave_config_untouched() {
        let cli = Cli::parse_from(["checkers-server"]);
        let config = cli.apply_to(ServerConfig::default());
        assert_eq!(config, ServerConfig::default());
        assert!(!cli.no_log);
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["checkers-server", "--port", "6001"]);
        let config = cli.apply_to(ServerConfig::default());
        assert_eq!(config.network.port, 6001);
    }

    #[test]
    fn test_cli_bind_and_countdown_override() {
        let cli = Cli::parse_from(["checkers-server", "--bind", "127.0.0.1", "--countdown", "0"]);
        let config = cli.apply_to(ServerConfig::default());
        assert_eq!(config.network.bind_address, "127.0.0.1");
        assert_eq!(config.session.countdown_secs, 0);
    }

    #[test]
    fn test_cli_no_log_flag() {
        let cli = Cli::parse_from(["checkers-server", "--no-log"]);
        assert!(cli.no_log);
    }

    #[test]
    fn test_cli_write_config_path() {
        let cli = Cli::parse_from(["checkers-server", "--port", "6001", "--write-config", "out.toml"]);
        assert_eq!(cli.write_config, Some(PathBuf::from("out.toml")));
        assert_eq!(cli.apply_to(ServerConfig::default()).network.port, 6001);
    }

    #[test]
    fn test_cli_config_path() {
        let cli = Cli::parse_from(["checkers-server", "--config", "/etc/checkers.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/checkers.toml")));
    }
}

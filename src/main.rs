//! # Teleop Link
//!
//! Drive a teleoperated device from a gamepad over a reconnecting WebSocket
//! control channel.
//!
//! ## Usage
//!
//! ```text
//! teleop-link [OPTIONS]
//!
//! Options:
//!   --config <PATH>   TOML configuration file [env: TELEOP_CONFIG]
//!   --host <HOST>     Device host, overrides [link] host [env: TELEOP_HOST]
//!   --no-gamepad      Do not sample the gamepad
//! ```
//!
//! Without `--config` the built-in defaults are used, which target
//! `ws://127.0.0.1:8080/ws/`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use teleop_link::config::Config;
use teleop_link::input::evdev_pad::EvdevGamepad;
use teleop_link::input::gamepad::{GamepadSampler, LoggingPresentation};
use teleop_link::input::InputSource;
use teleop_link::link::{control_url, ConnectionManager, LinkTimings, WebSocketTransport};

/// Prefix of the daily-rolling log files
const LOG_FILE_PREFIX: &str = "teleop-link.log";

/// Teleoperation control link.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "TELEOP_CONFIG")]
    config: Option<PathBuf>,

    /// Device host (`address:port`), overrides `[link] host`
    #[arg(long, env = "TELEOP_HOST")]
    host: Option<String>,

    /// Do not sample the gamepad
    #[arg(long)]
    no_gamepad: bool,
}

/// Applies command-line overrides and re-validates.
fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(host) = &args.host {
        config.link.host = host.clone();
    }
    if args.no_gamepad {
        config.gamepad.enabled = false;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Sets up console logging, plus a daily-rolling file when configured.
///
/// `RUST_LOG` takes precedence over `[logging] level`. The returned guard
/// flushes the file writer and must live until exit.
fn init_logging(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let (file_layer, guard) = match &config.logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn build_sources(config: &Config) -> Result<Vec<Box<dyn InputSource>>> {
    let mut sources: Vec<Box<dyn InputSource>> = Vec::new();

    if config.gamepad.enabled {
        let provider = EvdevGamepad::new(config.gamepad_device(), config.gamepad.axis_codes);
        sources.push(Box::new(GamepadSampler::new(
            Box::new(provider),
            Box::new(LoggingPresentation),
            config.gamepad_deadzone()?,
            config.gamepad.fullscreen_button,
        )));
        info!("Gamepad input enabled");
    } else {
        info!("Gamepad input disabled");
    }

    Ok(sources)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;
    let _log_guard = init_logging(&config);

    info!("Teleop Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let url = control_url(&config.link.host, &config.link.path);
    let transport = Arc::new(WebSocketTransport::new(url));
    let timings = LinkTimings::from(&config);
    let sources = build_sources(&config)?;

    info!(
        "Link timings: reconnect {:?}, sample {:?}, coalesce {:?}, heartbeat {:?}, peer timeout {:?}",
        timings.reconnect_interval,
        timings.sample_interval,
        timings.coalesce_interval,
        timings.heartbeat_interval,
        timings.peer_timeout
    );
    info!("Press Ctrl+C to exit");

    let manager =
        ConnectionManager::new(transport, timings, sources).context("invalid link timings")?;
    let stats = manager
        .run(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, shutting down..."),
                Err(e) => warn!("Cannot listen for Ctrl+C ({}), shutting down", e),
            }
        })
        .await;

    info!("Total commands sent: {}", stats.commands_sent);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["teleop-link"]).unwrap();
        assert!(args.config.is_none());
        assert!(args.host.is_none());
        assert!(!args.no_gamepad);
    }

    #[test]
    fn test_host_override_and_no_gamepad() {
        let args =
            Args::try_parse_from(["teleop-link", "--host", "10.0.0.7:8080", "--no-gamepad"]).unwrap();
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.link.host, "10.0.0.7:8080");
        assert!(!config.gamepad.enabled);
        assert!(build_sources(&config).unwrap().is_empty());
    }

    #[test]
    fn test_empty_host_override_rejected() {
        let args = Args::try_parse_from(["teleop-link", "--host", ""]).unwrap();
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn test_missing_config_file_is_reported() {
        let args = Args::try_parse_from(["teleop-link", "--config", "/nonexistent/teleop.toml"])
            .unwrap();
        let err = resolve_config(&args).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/teleop.toml"));
    }

    #[test]
    fn test_default_sources_include_gamepad() {
        let config = Config::default();
        assert_eq!(build_sources(&config).unwrap().len(), 1);
    }
}

mod commands;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use steadyfetch::app::App;
use steadyfetch::config::Config;

#[derive(Parser, Debug)]
#[command(name = "steadyfetch")]
#[command(about = "Fetch content that always arrives: network, cache, offline store, then defaults")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/steadyfetch/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Log at debug level
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: commands::Command,
}

/// Log to a daily file so stdout stays clean for command output.
fn setup_logging(verbose: bool) -> Result<WorkerGuard> {
  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("steadyfetch")
    .join("logs");

  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&log_dir, "steadyfetch.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let level = if verbose {
    tracing::Level::DEBUG
  } else {
    tracing::Level::INFO
  };

  tracing_subscriber::fmt()
    .with_writer(writer)
    .with_ansi(false)
    .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = setup_logging(args.verbose)?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let app = App::open(config).await?;
  commands::run(&app, args.command).await?;

  Ok(())
}

//! Command line and logging setup
//!
//! The terminal is the chat view, so logs go to stderr at `warn` by default,
//! or to a file with `--log-file`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, Level};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

/// Ping chat command-line interface
#[derive(Parser, Debug)]
#[command(name = "ping-chat")]
#[command(about = "Terminal client for the Ping chat services", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to <config_dir>/ping-chat/client.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(short, long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Enable JSON structured logging
    #[arg(long)]
    pub json_logs: bool,

    /// Show timestamps in logs (`--timestamps false` to hide them)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub timestamps: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Diagnostic subcommand
    #[command(subcommand)]
    pub command: Option<DiagnosticCommand>,
}

/// Diagnostic commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum DiagnosticCommand {
    /// Show client version and platform
    Version {
        /// Show platform details
        #[arg(long)]
        verbose: bool,
    },

    /// Show current configuration
    DumpConfig {
        /// Show storage paths too
        #[arg(long)]
        show_paths: bool,
    },
}

/// Initialize logging based on CLI configuration
pub fn init_logging(cli: &Cli) -> Result<()> {
    let log_level = cli.log_level.parse::<Level>().with_context(|| {
        format!(
            "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
            cli.log_level
        )
    })?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.as_str()))
        .context("Failed to create log filter")?;

    let (writer, ansi) = match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(true)
        .with_line_number(true);

    match (cli.json_logs, cli.timestamps) {
        (true, true) => subscriber.json().init(),
        (true, false) => subscriber.without_time().json().init(),
        (false, true) => subscriber.init(),
        (false, false) => subscriber.without_time().init(),
    }

    info!(
        "Logging initialized: level={}, json={}, timestamps={}",
        log_level, cli.json_logs, cli.timestamps
    );

    Ok(())
}

/// Print version information
pub fn display_version(verbose: bool) {
    println!("ping-chat v{}", env!("CARGO_PKG_VERSION"));

    if verbose {
        println!("Platform: {}", std::env::consts::OS);
        println!("Architecture: {}", std::env::consts::ARCH);
    }
}

/// Render the configuration for `dump-config`
pub fn render_config(config: &Config, show_paths: bool) -> Result<String> {
    let mut shown = config.clone();
    if !show_paths {
        shown.paths.config_dir = PathBuf::from("<hidden>");
        shown.paths.data_dir = PathBuf::from("<hidden>");
    }
    toml::to_string_pretty(&shown).context("Failed to serialize config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["ping-chat"]);
        assert_eq!(cli.log_level, "warn");
        assert!(!cli.json_logs);
        assert!(cli.timestamps);
        assert!(cli.config.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_dump_config() {
        let cli = Cli::parse_from([
            "ping-chat",
            "--config",
            "/tmp/client.toml",
            "dump-config",
            "--show-paths",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/client.toml")));
        assert_eq!(
            cli.command,
            Some(DiagnosticCommand::DumpConfig { show_paths: true })
        );
    }

    #[test]
    fn test_render_config_hides_paths() {
        let config = Config::default();
        let rendered = render_config(&config, false).unwrap();
        assert!(rendered.contains("<hidden>"));
        assert!(rendered.contains("user_service"));

        let rendered = render_config(&config, true).unwrap();
        assert!(!rendered.contains("<hidden>"));
    }
}

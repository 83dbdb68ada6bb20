mod app;
mod config;
mod diagnostics;
mod error_handler;
mod view;

use anyhow::{Context, Result};
use clap::Parser;
use diagnostics::{Cli, DiagnosticCommand};
use ping_chat_core::realtime::WebSocketTransportFactory;
use ping_chat_core::{ChatApi, DirectoryCache, HttpChatApi, SessionStore};
use std::sync::Arc;
use tracing::info;

use app::App;
use config::Config;

fn handle_diagnostic_command(command: &DiagnosticCommand, config: &Config) -> Result<()> {
    match command {
        DiagnosticCommand::Version { verbose } => {
            diagnostics::display_version(*verbose);
            Ok(())
        }
        DiagnosticCommand::DumpConfig { show_paths } => {
            println!("{}", diagnostics::render_config(config, *show_paths)?);
            Ok(())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging with CLI configuration
    diagnostics::init_logging(&cli).context("Failed to initialize logging")?;

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    // Handle diagnostic commands (no chat session)
    if let Some(command) = &cli.command {
        return handle_diagnostic_command(command, &config);
    }

    config
        .ensure_directories()
        .context("Failed to create client directories")?;

    info!("Starting ping-chat v{}", env!("CARGO_PKG_VERSION"));
    info!("User service: {}", config.services.user_service);
    info!("Chat service: {}", config.services.chat_service);
    info!("Realtime: {}", config.services.realtime_url);

    let api: Arc<dyn ChatApi> = Arc::new(
        HttpChatApi::with_timeout(config.endpoints(), config.request_timeout())
            .context("Failed to create HTTP client")?,
    );
    let session = SessionStore::new(api.clone(), config.token_store());
    let directory = DirectoryCache::new(api.clone());

    let realtime = config.realtime_config();
    let transports = Arc::new(WebSocketTransportFactory::new(realtime.connect_timeout));

    let mut app = App::new(
        api,
        session,
        directory,
        realtime,
        transports,
        config.typing_idle(),
    );

    app::spawn_input_reader(app.sender()).context("Failed to start input reader")?;

    app.start().await;

    let mut stdout = std::io::stdout();
    app.run(&mut stdout).await?;

    info!("ping-chat stopped");
    Ok(())
}

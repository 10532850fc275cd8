use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use homete_core::{Config, GatewaySettings, GeminiClient};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod markdown;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser, Debug)]
#[command(name = "homete")]
#[command(version, about = "Terminal chat that praises whatever you send it")]
struct Cli {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model used for text messages
    #[arg(long)]
    text_model: Option<String>,

    /// Model used for images
    #[arg(long)]
    vision_model: Option<String>,

    /// Gemini API base URL
    #[arg(long, env = "HOMETE_BASE_URL")]
    base_url: Option<String>,

    /// Config file (defaults to <config dir>/homete/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> Config {
        Config {
            api_key: self.api_key.clone(),
            text_model: self.text_model.clone(),
            vision_model: self.vision_model.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

/// Log to a file; stderr belongs to the terminal UI
fn init_logging() -> Result<WorkerGuard> {
    let log_dir = dirs::cache_dir()
        .map(|dir| dir.join("homete"))
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(&log_dir, "homete.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("homete_core=info,homete_tui=info"));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging()?;

    let file_config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let settings = GatewaySettings::resolve(cli.overrides(), file_config)?;
    info!(?settings, "starting homete");

    let mut app = App::new(GeminiClient::new(settings));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    info!(entries = app.controller.len(), "exiting");
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    Ok(())
}

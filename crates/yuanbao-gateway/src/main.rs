//! Yuanbao gateway daemon

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use yuanbao_gateway::GatewayError;
use yuanbao_gateway::api::{AppState, GatewayServer};
use yuanbao_gateway::backend::{BackendClient, HttpBackendClient};
use yuanbao_gateway::config::{BackendHeaders, Config};
use yuanbao_gateway::error::Result;
use yuanbao_gateway::orchestrator::RetryOrchestrator;
use yuanbao_gateway::session::SessionStore;

/// OpenAI- and Ollama-compatible gateway in front of the Yuanbao chat backend
#[derive(Parser)]
#[command(name = "yuanbao-gateway")]
#[command(about = "OpenAI- and Ollama-compatible gateway in front of the Yuanbao chat backend")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(long, short = 'l', global = true)]
    pub listen: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the gateway server (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config, cli.listen).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,yuanbao_gateway=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn read_config(path: &Path) -> Result<Config> {
    tracing::info!("Loading config from: {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|e| {
        GatewayError::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    toml::from_str(&content)
        .map_err(|e| GatewayError::Config(format!("Failed to parse config: {e}")))
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = config_path {
        return read_config(&path);
    }

    let default_paths = [
        dirs::home_dir().map(|h| h.join(".yuanbao").join("config.toml")),
        dirs::config_dir().map(|c| c.join("yuanbao").join("config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            return read_config(path);
        }
    }

    tracing::info!("No config file found, using defaults");
    Ok(Config::default())
}

async fn serve(config_path: Option<PathBuf>, listen: Option<String>) -> Result<()> {
    tracing::info!("Starting Yuanbao gateway");

    let mut config = load_config(config_path)?;
    if let Some(listen) = listen {
        config.server.listen_addr = listen;
    }
    tracing::debug!("Config loaded: {:?}", config);

    let headers = match BackendHeaders::load(&config.backend.headers_file) {
        Ok(headers) => Some(headers),
        Err(e) => {
            tracing::error!(
                "{e}; requests will fail until {} is provided",
                config.backend.headers_file.display()
            );
            None
        }
    };

    let backend: Arc<dyn BackendClient> = Arc::new(HttpBackendClient::new(&config.backend, headers)?);
    let store = Arc::new(SessionStore::new(backend.clone()));
    let orchestrator = Arc::new(RetryOrchestrator::new(
        store,
        backend,
        config.backend.max_retries,
    ));
    let state = Arc::new(AppState::new(orchestrator));

    let server = GatewayServer::new(config.server.listen_addr.clone(), state);
    server.serve().await
}

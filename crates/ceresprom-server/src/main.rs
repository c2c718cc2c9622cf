//! ceresprom Server - HTTP bridge into CeresDB
//!
//! Usage:
//!   ceresprom [OPTIONS]
//!
//! Options:
//!   --config <PATH>     Configuration file (default: ceresprom.yml)
//!   --host <HOST>       Bind address (overrides config)
//!   --port <PORT>       HTTP port (overrides config)
//!   --remote <ADDR>     Remote store address (overrides config)
//!
//! The `CERESDB_GRPC_ADDR`, `CERESDB_GRPC_TIMEOUT`, `CERESDB_ENABLE_DEBUG`
//! and `CERESDB_REMOTE_WRITE` environment variables override the `remote`
//! section of the configuration file.

use anyhow::Context;
use ceresprom_api::{create_router, AppState};
use ceresprom_query::PushdownConfig;
use ceresprom_storage::{HttpStorageClient, Querier, RemoteConfig, StorageClient, Writer};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Complete server configuration - can be loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listener settings
    pub server: ServerSettings,
    /// Remote store connection
    pub remote: RemoteConfig,
    /// Pushdown planning
    pub pushdown: PushdownConfig,
    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Server network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9090,
            request_timeout_secs: 120,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Include target in logs
    pub show_target: bool,
    /// Include thread IDs in logs
    pub show_thread_ids: bool,
    /// Include file and line numbers
    pub show_location: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_target: true,
            show_thread_ids: false,
            show_location: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment overrides; debug mode raises the log level
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.remote.apply_overrides(lookup);
        if self.remote.debug {
            self.logging.level = "debug".to_string();
        }
    }

    /// Get the log level
    pub fn log_level(&self) -> Level {
        match self.logging.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Write default config to a file (for generating example config)
    pub fn write_default(path: impl AsRef<Path>) -> anyhow::Result<()> {
        let config = Self::default();
        let yaml = serde_yaml::to_string(&config)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "ceresprom")]
#[command(author, version, about = "Prometheus query and write bridge for CeresDB")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "ceresprom.yml")]
    config: PathBuf,

    /// Bind address (overrides config)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// HTTP port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Remote store address (overrides config and environment)
    #[arg(long)]
    remote: Option<String>,

    /// Write the default configuration to the config path and exit
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.generate_config {
        ServerConfig::write_default(&args.config)?;
        println!("Generated default configuration: {}", args.config.display());
        return Ok(());
    }

    let mut config = if args.config.exists() {
        match ServerConfig::from_file(&args.config) {
            Ok(c) => {
                println!("Loaded configuration from: {}", args.config.display());
                c
            }
            Err(e) => {
                eprintln!("Warning: Failed to load {}: {}", args.config.display(), e);
                eprintln!("Using default configuration");
                ServerConfig::default()
            }
        }
    } else {
        ServerConfig::default()
    };

    config.apply_env();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(remote) = args.remote {
        config.remote.address = remote;
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .with_target(config.logging.show_target)
        .with_thread_ids(config.logging.show_thread_ids)
        .with_file(config.logging.show_location)
        .with_line_number(config.logging.show_location)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;

    info!("Starting ceresprom v{}", env!("CARGO_PKG_VERSION"));

    let state = build_state(&config)?;

    let request_timeout = Duration::from_secs(config.server.request_timeout_secs);
    let app = create_router(state, request_timeout);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Query endpoint: POST http://{}/api/v1/ceresdb/query", addr);
    info!("Write endpoint: POST http://{}/api/v1/ceresdb/write", addr);
    if config.remote.remote_write {
        info!("Remote write endpoint: POST http://{}/api/v1/write", addr);
    }
    info!("Health check: GET http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

/// Connect the handlers to the remote store; queries and writes share one client
fn build_state(config: &ServerConfig) -> anyhow::Result<Arc<AppState>> {
    let remote_timeout = config
        .remote
        .timeout()
        .with_context(|| format!("Invalid remote timeout {:?}", config.remote.timeout))?;
    info!("Remote store: {} (timeout {:?})", config.remote.base_url(), remote_timeout);
    info!(
        "Pushdown: field label {}, pushdown label {}, default field {}, literal-or rewrite {}",
        config.pushdown.field_label,
        config.pushdown.pushdown_label,
        config.pushdown.default_field,
        config.pushdown.literal_or_rewrite
    );

    let client: Arc<dyn StorageClient> = Arc::new(HttpStorageClient::new(&config.remote)?);
    let writer = Arc::new(Writer::new(Arc::clone(&client), remote_timeout));
    let querier = Arc::new(Querier::new(client, remote_timeout).with_debug(config.remote.debug));
    Ok(Arc::new(AppState::new(
        writer,
        querier,
        config.pushdown.clone(),
        config.remote.remote_write,
    )))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("SIGINT received, shutting down gracefully...");
        }
        _ = terminate => {
            info!("SIGTERM received, shutting down gracefully...");
        }
    }
}

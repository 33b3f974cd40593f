//! wildlife-ps - Wildlife Prediction Service
//!
//! Accepts image uploads over HTTP, delegates classification to the
//! external ML predictor and records each prediction against the species
//! catalog.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wildlife_common::config::{self, ConfigOverrides, ConfigSource, ServiceConfig};
use wildlife_ps::services::{HttpPredictorClient, Predictor};
use wildlife_ps::{build_router, AppState};

/// Command-line arguments for wildlife-ps
#[derive(Parser, Debug)]
#[command(name = "wildlife-ps")]
#[command(about = "Wildlife species prediction service")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = config::CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "WILDLIFE_PORT")]
    port: Option<u16>,

    /// SQLite database file
    #[arg(long, env = "WILDLIFE_DATABASE")]
    database: Option<PathBuf>,

    /// Root directory for stored uploads
    #[arg(long, env = "WILDLIFE_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// Largest accepted upload in bytes
    #[arg(long, env = "WILDLIFE_MAX_UPLOAD_BYTES")]
    max_upload_bytes: Option<u64>,

    /// Comma-separated allowed file extensions
    #[arg(long, env = "WILDLIFE_ALLOWED_EXTENSIONS")]
    allowed_extensions: Option<String>,

    /// Predictor base URL
    #[arg(long, env = "WILDLIFE_PREDICTOR_URL")]
    predictor_url: Option<String>,

    /// Predictor request timeout in milliseconds
    #[arg(long, env = "WILDLIFE_PREDICTOR_TIMEOUT_MS")]
    predictor_timeout_ms: Option<u64>,

    /// Insert unseen predicted labels as new species (true/false)
    #[arg(long, env = "WILDLIFE_AUTO_CREATE_SPECIES")]
    auto_create_species: Option<bool>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            upload_dir: self.upload_dir.clone(),
            max_upload_bytes: self.max_upload_bytes,
            allowed_extensions: self.allowed_extensions.clone(),
            predictor_url: self.predictor_url.clone(),
            predictor_timeout_ms: self.predictor_timeout_ms,
            auto_create_species: self.auto_create_species,
            database_path: self.database.clone(),
            port: self.port,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing starts so its log level can apply
    let (toml, config_source) = config::load_config_file(args.config.as_deref())?;
    let config = ServiceConfig::resolve(args.overrides(), toml)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("wildlife_ps={0},wildlife_common={0},tower_http={0}", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Wildlife Prediction Service (wildlife-ps) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_source {
        ConfigSource::File(path) => info!("Loaded config file: {}", path.display()),
        ConfigSource::MissingFile(path) => {
            warn!("Config file not found: {} (using defaults)", path.display())
        }
        ConfigSource::Defaults => info!("No config file found, using defaults"),
    }
    info!(
        upload_dir = %config.upload_dir.display(),
        max_upload_bytes = config.max_upload_bytes,
        allowed_extensions = %config.allowed_extensions_display(),
        predictor_url = %config.predictor_url,
        predictor_timeout_ms = config.predictor_timeout.as_millis() as u64,
        auto_create_species = config.auto_create_species,
        "Configuration resolved"
    );

    info!("Database: {}", config.database_path.display());
    let db_pool = wildlife_common::db::init_database_pool(&config.database_path)
        .await
        .context("Failed to open database")?;
    info!("Database connection established");

    let predictor = HttpPredictorClient::from_config(&config)
        .context("Failed to build predictor HTTP client")?;
    if predictor.health_check().await {
        info!("✓ Predictor reachable at {}", predictor.base_url());
    } else {
        // Not fatal: uploads fail with PREDICTOR_UNREACHABLE until it comes up
        warn!("Predictor not reachable at {}", predictor.base_url());
    }

    let port = config.port;
    let state = AppState::new(db_pool, config, Arc::new(predictor))
        .context("Failed to initialize upload directory")?;
    state
        .ingest
        .ensure_directories()
        .await
        .context("Failed to create upload directories")?;
    info!("Upload directory: {}", state.ingest.upload_dir().display());

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

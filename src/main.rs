//! Stream switcher server
//!
//! Runs one continuous encoded audio output and exposes an HTTP control
//! surface for switching the source that feeds it.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stream_switcher::config::ServerConfig;
use stream_switcher::config_file::{generate_default_config, ConfigFile};
use stream_switcher::error::{ServerError, ServerResult};
use stream_switcher::http::create_router;
use stream_switcher::state::AppState;
use stream_switcher::{SourceRegistry, StreamEngine};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "stream-switcher";

#[tokio::main]
async fn main() -> ServerResult<()> {
    let mut args = std::env::args().skip(1);
    let first = args.next();

    if first.as_deref() == Some("--generate-config") {
        let path = args.next().unwrap_or_else(|| "config.toml".to_string());
        generate_default_config(&path).map_err(|e| ServerError::Config(e.to_string()))?;
        println!("Wrote default configuration to {}", path);
        return Ok(());
    }

    // Load configuration
    let config_path = first.unwrap_or_else(|| "config.toml".to_string());
    let loaded = if std::path::Path::new(&config_path).exists() {
        ConfigFile::from_file(&config_path)
            .map(ConfigFile::into_server_config)
            .map_err(|e| e.to_string())
    } else {
        Ok(ServerConfig::default())
    };
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => ServerConfig::default(),
    };

    // Initialize logging
    init_logging(&config);

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    if let Err(e) = loaded {
        tracing::warn!(
            "Failed to load config file {}: {}. Using defaults.",
            config_path,
            e
        );
    }
    tracing::info!("Configuration loaded: {:?}", config);

    let registry = SourceRegistry::open(&config.registry_path)?;
    tracing::info!(
        path = %registry.path().display(),
        sources = registry.list().len(),
        "Source registry loaded"
    );

    let default_locator = AppState::default_locator(&config, &registry);
    let engine = StreamEngine::start(config.engine.clone(), default_locator.as_deref()).await?;

    // Create application state
    let state = Arc::new(AppState::new(engine.clone(), registry, config.clone()));

    // Build router
    let app = create_router(state);

    // Start server
    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| ServerError::Config(format!("invalid listen address: {}", e)))?;
    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    engine.shutdown().await;
    served?;

    tracing::info!("{} stopped", APP_NAME);
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("stream_switcher={},tower_http=debug", config.log_level).into()
    });
    let json = config.log_format.eq_ignore_ascii_case("json");

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Resolves on ctrl-c or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

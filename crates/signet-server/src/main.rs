use std::env;
use std::path::PathBuf;

use signet_server::{AppState, load_config, router};

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From SIGNET_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (signet.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (SIGNET_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present, so local development can keep the client secret
    // out of the config file.
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    signet_server::observability::init_tracing();

    let (config_path, source) = resolve_config_path();
    let explicit = !matches!(source, ConfigSource::Default);

    let config = match load_config(&config_path, explicit) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path.display(),
        source = %source,
        provider = %config.provider.name,
        "Configuration loaded"
    );

    signet_server::observability::apply_logging_level(&config.logging.level);

    let state = match AppState::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: SIGNET_CONFIG
/// 3. Default: signet.toml
fn resolve_config_path() -> (PathBuf, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config"
            && let Some(path) = args.next()
        {
            return (PathBuf::from(path), ConfigSource::CliArgument);
        }
    }

    if let Ok(path) = env::var("SIGNET_CONFIG") {
        return (PathBuf::from(path), ConfigSource::EnvironmentVariable);
    }

    (PathBuf::from("signet.toml"), ConfigSource::Default)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install shutdown signal handler");
    }
    tracing::info!("Shutting down");
}

//! joi-companion server binary.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use joi_companion::config::{Cli, Config};
use joi_companion::metrics::Metrics;
use joi_companion::provider::gemini::GeminiProvider;
use joi_companion::provider::ProviderHandle;
use joi_companion::relay::{Relay, RelaySettings};
use joi_companion::server::api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // A missing .env is normal in deployments that set the environment directly.
    let dotenv = dotenvy::dotenv();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "joi_companion=debug,tower_http=debug"
    } else {
        "joi_companion=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("joi-companion v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    config.apply_cli(&cli);

    info!(
        model = config.provider.model,
        temperature = config.provider.temperature,
        thinking_budget = config.provider.thinking_budget,
        "Configuration loaded"
    );

    // Credential absence is reported in-band per request, not fatal.
    let credential = config.credential_from_env();
    if credential.is_none() {
        warn!(
            env = config.provider.api_key_env,
            "Provider API key not set; chat replies will carry an error"
        );
    }

    let provider = GeminiProvider::connect(&config.provider);
    if let ProviderHandle::Unavailable(reason) = &provider {
        warn!(reason = %reason, "Gemini client not available");
    }

    let metrics = Metrics::new()?;
    let relay = Relay::new(
        provider,
        RelaySettings::from_config(&config, credential),
        metrics.clone(),
    );

    // Build application state.
    let state = Arc::new(AppState {
        relay,
        metrics,
        start_time: Instant::now(),
    });

    // Build the HTTP router.
    let app = build_router(state, &config.server);

    // Start the server.
    let listen_addr = config.server.listen.clone();
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

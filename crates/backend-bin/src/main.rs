use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use authkeeper_backend_lib::{
    config::{Settings, DEFAULT_CONFIG_FILE},
    middleware::prune_rate_limits,
    routes, AppState,
};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

/// Credential and bearer-token service
#[derive(Debug, Parser)]
#[command(name = "authkeeper", version, about)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override the configured bind address
    #[arg(long)]
    bind: Option<SocketAddr>,
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.to_lowercase()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load_from(&args.config)?;
    if let Some(bind) = args.bind {
        settings.bind_addr = bind;
    }
    init_tracing(&settings);

    let addr = settings.bind_addr;
    let state = Arc::new(AppState::from_settings(settings)?);

    // Lapsed login lockouts and rate-limit windows
    let housekeeping = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        loop {
            interval.tick().await;
            housekeeping.sessions.throttle().cleanup();
            prune_rate_limits(&housekeeping);
        }
    });

    let app = routes::create_router(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, config = %args.config.display(), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}

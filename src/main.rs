use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use open_letters::config::{Cli, Config};
use open_letters::feed::FeedService;
use open_letters::state::AppState;
use open_letters::{routes, store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Durable store if it opens, in-memory fallback otherwise
    let store = store::open(&config);
    let feed = FeedService::from_config(store, &config);

    let state = AppState {
        feed,
        config: config.clone(),
    };
    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

use anyhow::Context;
use bookshelf::config::Config;
use bookshelf::database::Sqlite;
use bookshelf::http::{AppState, HttpServer, HttpServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let filter = EnvFilter::try_new(config.log_filter())
        .with_context(|| format!("Invalid log filter {}", config.log_filter()))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let sqlite = Sqlite::new(config.database_url()).await?;
    tracing::info!(database_url = config.database_url(), "database ready");

    let state = AppState::new(sqlite);
    let server_config = HttpServerConfig::new(config.server_port());
    let http_server = HttpServer::new(state, server_config).await?;
    http_server.run().await
}

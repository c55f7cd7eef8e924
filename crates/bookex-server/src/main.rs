use bookex_server::{config::ServerConfig, run::run, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,bookex_app=debug,bookex_server=debug,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = ServerConfig::load()?;
    info!(
        "Starting bookex server, data in {:?}, pictures in {:?}",
        args.data_dir(),
        args.files_dir()
    );
    run(args).await
}

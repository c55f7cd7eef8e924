use crate::config::{ServerConfig, MEDIA_PATH};
use crate::error::Result;
use axum::http::StatusCode;
use axum::{response::IntoResponse, routing::get, Router};
use bookex_app::state::{AppConfig, AppState};
use bookex_store::FileStore;
use futures::FutureExt;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tracing::{debug, info};

const SESSION_COOKIE_NAME: &str = "bookex";

pub async fn run(args: ServerConfig) -> Result<()> {
    let state = build_state(&args).await?;
    run_with_state(args, state).await
}

pub async fn run_with_state(args: ServerConfig, state: AppState) -> Result<()> {
    let shutdown = tokio::signal::ctrl_c().map(|_| ());
    run_graceful_with_state(args, state, shutdown).await
}

pub async fn run_graceful_with_state<S>(
    args: ServerConfig,
    state: AppState,
    shutdown_signal: S,
) -> Result<()>
where
    S: std::future::Future<Output = ()> + Send + 'static,
{
    let app = main_router(state, &args)?;

    let ip: std::net::IpAddr = args.listen_address.parse()?;
    let addr = std::net::SocketAddr::from((ip, args.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    debug!("Server stopped");
    Ok(())
}

fn main_router(state: AppState, args: &ServerConfig) -> Result<Router<()>> {
    let session_expiry = time::Duration::try_from(args.session_expiry)?;
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_secure(args.secure_cookie)
        .with_expiry(Expiry::OnInactivity(session_expiry));

    let router = bookex_app::router(args.upload_limit_mb)
        .layer(session_layer)
        .with_state(state)
        // static and public resources
        .nest_service(MEDIA_PATH, ServeDir::new(args.files_dir()))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http());
    Ok(router)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn build_state(config: &ServerConfig) -> Result<AppState> {
    let data_dir = config.data_dir();
    if !data_dir.is_dir() {
        tokio::fs::create_dir_all(&data_dir).await?;
        info!("Created data directory {data_dir:?}");
    }

    let app_config: AppConfig = config.into();

    let files_dir = config.files_dir();
    if !files_dir.is_dir() {
        tokio::fs::create_dir_all(&files_dir).await?;
        info!("Created directory for uploaded pictures {files_dir:?}");
    }

    let pool = bookex_dal::new_pool(&config.database_url()).await?;
    bookex_dal::migrate(&pool).await?;
    debug!("Database {} is ready", config.database_url());

    let store = FileStore::new(files_dir);
    Ok(AppState::new(app_config, pool, store))
}

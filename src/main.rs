use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tracker::config::{Config, StoreBackend};
use tracker::store::memory::MemoryStore;
use tracker::store::postgres::PgStore;
use tracker::store::{self, AppState, IssueStore, UserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("TRACKER_LOG").unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().json())
        .init();

    let cfg = Config::load()?;
    if cfg.uses_dev_secret() {
        tracing::warn!("TRACKER_JWT_SECRET not set, signing tokens with the development secret");
    }

    let (issue_store, user_store): (Arc<dyn IssueStore>, Arc<dyn UserStore>) = match cfg.store {
        StoreBackend::Postgres => {
            let pg = Arc::new(PgStore::connect(&cfg.database_url).await?);
            let issues: Arc<dyn IssueStore> = pg.clone();
            (issues, pg)
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store, data is lost on shutdown");
            let mem = Arc::new(MemoryStore::new());
            let issues: Arc<dyn IssueStore> = mem.clone();
            (issues, mem)
        }
    };

    let valkey = store::valkey::connect(cfg.valkey_url.as_deref()).await?;

    let state = AppState::new(issue_store, user_store, valkey, cfg.clone());

    // Seed the admin account on first run
    store::bootstrap::run(&state.credentials, cfg.admin_password.as_deref()).await?;

    let app = tracker::api::app(state);

    let addr: SocketAddr = cfg.listen.parse()?;
    tracing::info!(%addr, store = %cfg.store, "starting tracker");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("tracker stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

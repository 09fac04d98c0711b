use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use studentd::api::{self, AppState};
use studentd::config::Config;
use studentd::store::{seed_sample_students, MemoryStore, SqliteStore, StoreKind, StudentStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout only carries the readiness line.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    let store: Arc<dyn StudentStore> = match config.store {
        StoreKind::Memory => Arc::new(MemoryStore::new(config.store_options())),
        StoreKind::Sqlite => Arc::new(
            SqliteStore::open(&config.db_path, config.store_options())
                .with_context(|| format!("failed to open {}", config.db_path.display()))?,
        ),
    };

    if config.seed {
        let added = seed_sample_students(store.as_ref())
            .context("failed to seed sample students")?;
        if added > 0 {
            info!(added, "seeded sample students");
        }
    }

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    let addr = listener.local_addr()?;
    info!(
        %addr,
        store = %config.store,
        delete_mode = ?config.delete_mode,
        "studentd listening"
    );

    let mut stdout = std::io::stdout();
    let _ = writeln!(stdout, "listening on {addr}");
    let _ = stdout.flush();

    let app = api::router(AppState::new(store, config.ages));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}

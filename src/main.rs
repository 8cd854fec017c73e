//! Libro Reader
//!
//! Serves a single book file to the reading engine and reports the stored
//! reading state for it.
//!
//! Usage: `libro-reader <book-file>`

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use libro_reader::config::Config;
use libro_reader::db;
use libro_reader::server::BookServer;
use libro_reader::session::SavedState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "libro_reader=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let book_path = std::env::args()
        .nth(1)
        .context("usage: libro-reader <book-file>")?;

    let config = Config::from_env();
    tracing::info!("Starting Libro Reader v{}", env!("CARGO_PKG_VERSION"));

    // Initialize database
    let pool = db::create_pool(&config.database.url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.url))?;
    tracing::info!("Database initialized at {}", config.database.url);

    // Start the book server
    let server = BookServer::start(&config.server.host, config.server.port, &book_path)
        .await
        .with_context(|| format!("Failed to serve {}", book_path))?;

    let saved = SavedState::load(&pool, server.book().name()).await?;
    match &saved.location {
        Some(location) => tracing::info!(
            fragment = location.fragment().unwrap_or_default(),
            progression = ?location.total_progression(),
            title = location.title.as_deref().unwrap_or_default(),
            "Resuming from saved position"
        ),
        None => tracing::info!("No saved position, starting from the beginning"),
    }
    tracing::info!("{} saved highlights", saved.highlights.len());
    tracing::info!("Book available at {}", server.url());

    shutdown_signal().await;
    server.shutdown().await;
    pool.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

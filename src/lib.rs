//! Single-choice opinion poll server.
//!
//! Every connection may vote once for one of a fixed list of options. The
//! `voters` table carries a uniqueness constraint on the voter key, and each
//! cast writes its vote row and voter row in one transaction, so concurrent
//! duplicates lose at commit time rather than being double counted. Standings
//! are recomputed from the `votes` table on every read.
//!
//! # Running
//!
//! ```sh
//! DATABASE_URL=sqlite:voting.db POLL_OPTIONS="Red|Green|Blue" cargo run
//! ```
//!
//! `DATABASE_URL` may also be a `postgres://` or `postgresql://` URL.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod voting;

use std::net::SocketAddr;
use std::sync::Arc;

use log::info;
use tokio::net::TcpListener;
use tokio::signal;

use config::Config;
use handlers::AppState;
use ledger::Ledger;

pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let store = db::connect(&config).await?;
    let ledger = Ledger::new(store, config.options.clone(), config.storage_timeout);

    let config = Arc::new(config);
    let state = AppState::new(Arc::clone(&config), Arc::new(ledger));
    let app = handlers::router(state);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Poll with {} options listening on {}", config.options.len(), address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

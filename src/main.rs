//! Flashcard Frenzy server entrypoint: match channel relay, result store and docs.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flashcard_frenzy::{
    dao::match_store::{MatchStore, memory::MemoryMatchStore},
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new();
    start_result_store(app_state.clone()).await;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    app_state.channels().close_all();
    Ok(())
}

/// Install the result store: CouchDB under supervision when configured,
/// otherwise an in-memory store.
#[cfg(feature = "couch-store")]
async fn start_result_store(state: SharedState) {
    use flashcard_frenzy::{
        dao::{
            match_store::couchdb::{CouchConfig, CouchMatchStore},
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    match CouchConfig::from_env() {
        Ok(config) => {
            info!(base_url = %config.base_url, database = %config.database, "using CouchDB result store");
            tokio::spawn(storage_supervisor::run(state, move || {
                let config = config.clone();
                async move {
                    let store = CouchMatchStore::connect(config)
                        .await
                        .map_err(StorageError::from)?;
                    Ok(Arc::new(store) as Arc<dyn MatchStore>)
                }
            }));
        }
        Err(err) => {
            warn!(error = %err, "CouchDB not configured; keeping match records in memory");
            install_memory_store(&state).await;
        }
    }
}

#[cfg(not(feature = "couch-store"))]
async fn start_result_store(state: SharedState) {
    info!("keeping match records in memory");
    install_memory_store(&state).await;
}

async fn install_memory_store(state: &SharedState) {
    state
        .set_match_store(Arc::new(MemoryMatchStore::new()) as Arc<dyn MatchStore>)
        .await;
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

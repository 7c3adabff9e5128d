//! Touchline Back binary entrypoint wiring the REST, SSE and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use touchline_back::{
    config::AppConfig,
    dao::{
        fixture_store::{FixtureStore, memory::InMemoryFixtureStore},
        storage::StorageError,
    },
    routes,
    services::{sse_events, storage_supervisor, sync_service},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    spawn_storage(app_state.clone());
    tokio::spawn(sse_events::run_change_relay(app_state.clone()));
    tokio::spawn(sync_service::run_periodic(app_state.clone()));

    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    final_save(&app_state).await;
    Ok(())
}

/// Start the storage supervisor for the backend selected by `STORAGE_BACKEND`.
fn spawn_storage(state: SharedState) {
    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| default_backend().into());

    match backend.trim().to_ascii_lowercase().as_str() {
        "memory" => {
            info!("using in-memory storage; data is lost on restart");
            let store: Arc<dyn FixtureStore> = Arc::new(InMemoryFixtureStore::new());
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(store) }
            }));
        }
        #[cfg(feature = "couch-store")]
        "couch" => spawn_couch(state),
        other => {
            error!(backend = other, "unknown storage backend; running in degraded mode");
        }
    }
}

#[cfg(feature = "couch-store")]
fn spawn_couch(state: SharedState) {
    use touchline_back::dao::fixture_store::couchdb::{CouchConfig, CouchFixtureStore};

    let config = match CouchConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid CouchDB configuration; running in degraded mode");
            return;
        }
    };

    info!(base_url = %config.base_url, database = %config.database, "using CouchDB storage");
    tokio::spawn(storage_supervisor::run(state, move || {
        let config = config.clone();
        async move {
            CouchFixtureStore::connect(config)
                .await
                .map(|store| Arc::new(store) as Arc<dyn FixtureStore>)
                .map_err(StorageError::from)
        }
    }));
}

fn default_backend() -> &'static str {
    if cfg!(feature = "couch-store") {
        "couch"
    } else {
        "memory"
    }
}

/// Give pending changes one last chance to reach storage before exiting.
async fn final_save(state: &SharedState) {
    let has_unsaved = state.match_store().read().await.session().has_unsaved_changes;
    if !has_unsaved {
        return;
    }

    match sync_service::save_now(state).await {
        Ok(response) if !response.has_unsaved_changes => info!("pending changes saved on shutdown"),
        Ok(response) => warn!(
            status = %response.status,
            unsaved = ?response.unsaved_items,
            "shutting down with unsaved changes"
        ),
        Err(err) => warn!(error = %err, "final save failed"),
    }
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
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

//! CineMatch Back binary entrypoint wiring REST, SSE, and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod catalog;
mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use config::AppConfig;
use dao::room_store::{RoomStore, memory::MemoryRoomStore};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_config = AppConfig::load();
    let app_state = AppState::new(app_config);

    match env::var("MONGO_URI") {
        #[cfg(feature = "mongo-store")]
        Ok(mongo_uri) => {
            let mongo_db = env::var("MONGO_DB").ok();
            let supervisor_state = app_state.clone();
            tokio::spawn(services::storage_supervisor::run(
                supervisor_state,
                move || {
                    let uri = mongo_uri.clone();
                    let db_name = mongo_db.clone();
                    async move {
                        let config =
                            dao::room_store::mongodb::MongoConfig::from_uri(&uri, db_name.as_deref())
                                .await?;
                        let store =
                            dao::room_store::mongodb::MongoRoomStore::connect(config).await?;
                        Ok(Arc::new(store) as Arc<dyn RoomStore>)
                    }
                },
            ));
        }
        #[cfg(not(feature = "mongo-store"))]
        Ok(_) => {
            anyhow::bail!("MONGO_URI is set but this build does not include the mongo-store feature")
        }
        Err(_) => {
            info!("MONGO_URI not set; using the in-memory store");
            app_state
                .set_room_store(Arc::new(MemoryRoomStore::default()))
                .await;
        }
    }

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

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

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: state::SharedState) -> Router<()> {
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

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

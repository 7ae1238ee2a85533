//! Relay HTTP server

use axum::{routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

use crate::config::RelayConfig;
use crate::constants::STREAM_PAGE_PATH;
use crate::error::Result;
use crate::session::SessionManager;
use crate::ui::{handlers, websocket};

/// Shared router state
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub started_at: Instant,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            sessions,
            started_at: Instant::now(),
            shutdown,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Ask every open socket to close with "going away"
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

/// WebSocket relay plus its status API and browser viewer
pub struct RelayServer {
    config: RelayConfig,
    state: Arc<AppState>,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Self {
        let sessions = Arc::new(SessionManager::from_config(&config));
        Self {
            config,
            state: Arc::new(AppState::new(sessions)),
        }
    }

    pub fn sessions(&self) -> Arc<SessionManager> {
        Arc::clone(&self.state.sessions)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(websocket::ws_handler))
            .route("/api/status", get(handlers::get_status))
            .route("/api/sessions/:token", get(handlers::get_session))
            .route(STREAM_PAGE_PATH, get(handlers::stream_page))
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.state))
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!("Relay listening on ws://{}", addr);
        tracing::info!("Broadcast stats logged every {} frames", self.config.stats_interval);

        let state = Arc::clone(&self.state);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown requested, closing relay connections");
                state.begin_shutdown();
            })
            .await?;

        tracing::info!("Relay stopped");
        Ok(())
    }
}

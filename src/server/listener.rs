//! Relay server
//!
//! Builds the axum router, accepts WebSocket upgrades and hands each
//! connection to its lifecycle loop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::Result;
use crate::protocol::constants::{MJPEG_ROUTE, PRODUCER_ROUTE, VIEWER_ROUTE};
use crate::registry::{ConnectionId, RegistryConfig, SessionId, SessionRegistry};
use crate::server::config::ServerConfig;
use crate::server::connection::{binary_frames, client_messages, WsConnection};
use crate::server::lifecycle::{run_producer, run_viewer};
use crate::server::mjpeg;

const VIEWER_PAGE: &str = include_str!("../../assets/viewer.html");

/// Frame relay server
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<SessionRegistry<WsConnection>>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry_config(config, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            registry: Arc::new(SessionRegistry::with_config(registry_config)),
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the session registry
    pub fn registry(&self) -> &Arc<SessionRegistry<WsConnection>> {
        &self.registry
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the HTTP router for this server
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/", get(viewer_page))
            .route("/health", get(health))
            .route("/stats", get(stats))
            .route(PRODUCER_ROUTE, get(producer_upgrade))
            .route(VIEWER_ROUTE, get(viewer_upgrade))
            .route(MJPEG_ROUTE, get(mjpeg_stream))
            .with_state(Arc::clone(self))
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        Arc::new(self).serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tracing::info!(addr = %listener.local_addr()?, "Relay server listening");

        // Spawn cleanup task for session registry
        let cleanup_handle = self.registry.spawn_cleanup_task();

        let app = self.router();
        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
        })
        .await;

        // Stop cleanup task on shutdown
        if let Some(handle) = cleanup_handle {
            handle.abort();
        }

        result.map_err(Into::into)
    }

    fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Check the connection limit
    ///
    /// `Err` means the limit is reached; `Ok(None)` means there is no limit.
    fn admit(&self, peer: SocketAddr) -> std::result::Result<Option<OwnedSemaphorePermit>, ()> {
        match &self.connection_semaphore {
            Some(sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Ok(Some(permit)),
                Err(_) => {
                    tracing::warn!(peer = %peer, "Connection rejected: limit reached");
                    Err(())
                }
            },
            None => Ok(None),
        }
    }

    async fn serve_producer(&self, socket: WebSocket, session_id: SessionId, peer: SocketAddr) {
        let id = self.next_connection_id();
        tracing::debug!(connection = %id, peer = %peer, session = %session_id, "Producer connected");

        let (sink, inbound) = socket.split();
        let (connection, writer) = WsConnection::spawn(id, peer, sink, &self.config);
        let frames = binary_frames(inbound.take_until(writer));

        run_producer(&self.registry, session_id, Arc::new(connection), frames).await;
        tracing::debug!(connection = %id, "Producer connection closed");
    }

    async fn serve_viewer(&self, socket: WebSocket, peer: SocketAddr) {
        let id = self.next_connection_id();
        tracing::debug!(connection = %id, peer = %peer, "Viewer connected");

        let (sink, inbound) = socket.split();
        let (connection, writer) = WsConnection::spawn(id, peer, sink, &self.config);
        let messages = client_messages(inbound.take_until(writer));

        run_viewer(&self.registry, Arc::new(connection), messages).await;
        tracing::debug!(connection = %id, "Viewer connection closed");
    }
}

async fn producer_upgrade(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(server): State<Arc<RelayServer>>,
) -> Response {
    let Ok(permit) = server.admit(peer) else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    ws.max_message_size(server.config.max_message_size)
        .on_upgrade(move |socket| async move {
            server
                .serve_producer(socket, SessionId::from(session_id), peer)
                .await;
            drop(permit);
        })
}

async fn viewer_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(server): State<Arc<RelayServer>>,
) -> Response {
    let Ok(permit) = server.admit(peer) else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    ws.max_message_size(server.config.max_message_size)
        .on_upgrade(move |socket| async move {
            server.serve_viewer(socket, peer).await;
            drop(permit);
        })
}

async fn mjpeg_stream(
    Path(session_id): Path<String>,
    State(server): State<Arc<RelayServer>>,
) -> Response {
    let session_id = SessionId::from(session_id);
    let Some(frames) = server.registry.watch_frames(&session_id).await else {
        tracing::debug!(session = %session_id, "MJPEG request for unknown session");
        return StatusCode::NOT_FOUND.into_response();
    };

    tracing::debug!(session = %session_id, "MJPEG stream opened");
    let body = Body::from_stream(
        mjpeg::mjpeg_parts(frames).map(Ok::<_, std::convert::Infallible>),
    );
    ([(header::CONTENT_TYPE, mjpeg::content_type())], body).into_response()
}

async fn viewer_page() -> Html<&'static str> {
    Html(VIEWER_PAGE)
}

async fn health() -> &'static str {
    "OK"
}

async fn stats(State(server): State<Arc<RelayServer>>) -> impl IntoResponse {
    Json(server.registry.stats().await)
}

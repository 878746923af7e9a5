//! Static and live-reload HTTP servers.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::header,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use sitewright_build::SiteConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::services::ServeDir;

use crate::livereload::{
    client_script, inject_script, ReloadHub, ReloadMessage, SCRIPT_PATH, SOCKET_PATH,
};
use crate::rebuild::Rebuilder;
use crate::watcher::{FileWatcher, WatchGroup};

/// Configuration for the development servers.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Directory to serve
    pub root: PathBuf,

    pub host: String,

    /// Plain static server port
    pub port: u16,

    /// Port of the server that injects the reload client
    pub reload_port: u16,

    /// Open a browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("dist"),
            host: "127.0.0.1".to_string(),
            port: 8888,
            reload_port: 3000,
            open: false,
        }
    }
}

impl DevServerConfig {
    /// Serve the site's output directory with its configured ports.
    pub fn from_site(site: &SiteConfig) -> Self {
        Self {
            root: site.output_dir(),
            host: site.server.host.clone(),
            port: site.server.port,
            reload_port: site.server.reload_port,
            open: site.server.open,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}: {1}")]
    Address(String, String),

    #[error("Failed to bind to {0}: {1}")]
    Bind(SocketAddr, String),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Server error: {0}")]
    Serve(String),
}

/// Static server plus live-reload server, optionally driving rebuilds.
pub struct DevServer {
    config: DevServerConfig,
    hub: ReloadHub,
    watch: Option<(Rebuilder, Vec<WatchGroup>)>,
}

impl DevServer {
    pub fn new(config: DevServerConfig) -> Self {
        Self {
            config,
            hub: ReloadHub::new(),
            watch: None,
        }
    }

    /// Rerun tasks through `rebuilder` when files in `groups` change.
    pub fn with_watch(mut self, rebuilder: Rebuilder, groups: Vec<WatchGroup>) -> Self {
        self.watch = Some((rebuilder, groups));
        self
    }

    /// Hub used by the reload server; rebuilders should broadcast through it.
    pub fn hub(&self) -> ReloadHub {
        self.hub.clone()
    }

    /// Output directory as-is.
    pub fn static_router(&self) -> Router {
        Router::new().fallback_service(ServeDir::new(&self.config.root))
    }

    /// Output directory with the reload client injected into HTML, plus the
    /// socket and script endpoints.
    pub fn reload_router(&self) -> Router {
        Router::new()
            .route(SOCKET_PATH, get(ws_handler))
            .route(SCRIPT_PATH, get(script_handler))
            .fallback_service(ServeDir::new(&self.config.root))
            .layer(middleware::from_fn(inject_reload_client))
            .with_state(self.hub.clone())
    }

    fn addr(&self, port: u16) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.config.host, port);
        addr.parse()
            .map_err(|e: std::net::AddrParseError| ServerError::Address(addr, e.to_string()))
    }

    /// Bind both servers, start watching, and serve until shutdown.
    pub async fn start(self) -> Result<(), ServerError> {
        let static_addr = self.addr(self.config.port)?;
        let reload_addr = self.addr(self.config.reload_port)?;

        let static_listener = TcpListener::bind(static_addr)
            .await
            .map_err(|e| ServerError::Bind(static_addr, e.to_string()))?;
        let reload_listener = TcpListener::bind(reload_addr)
            .await
            .map_err(|e| ServerError::Bind(reload_addr, e.to_string()))?;

        let static_app = self.static_router();
        let reload_app = self.reload_router();

        if let Some((rebuilder, groups)) = self.watch {
            let (watcher, mut rx) = FileWatcher::new(groups)?;
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    rebuilder.handle(&event).await;
                }
                // Keep watcher alive
                drop(watcher);
            });
        }

        tracing::info!(
            "Serving {} at http://{}",
            self.config.root.display(),
            static_addr
        );
        tracing::info!("Live reload at http://{}", reload_addr);

        if self.config.open {
            let url = format!("http://{}", reload_addr);
            if let Err(e) = open::that(&url) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }

        let static_server = async { axum::serve(static_listener, static_app).await };
        let reload_server = async { axum::serve(reload_listener, reload_app).await };

        tokio::try_join!(static_server, reload_server)
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        Ok(())
    }
}

/// Rewrite HTML responses to load the reload client.
async fn inject_reload_client(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read response body: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let html = inject_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<ReloadHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, hub))
}

async fn handle_ws(mut socket: WebSocket, hub: ReloadHub) {
    let mut rx = hub.subscribe();

    if send(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    loop {
        match rx.recv().await {
            Ok(msg) => {
                if send(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Reload client lagged by {} messages", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn send(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

async fn script_handler() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], client_script())
}

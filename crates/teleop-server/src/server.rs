//! [`RelayServer`] – HTTP + WebSocket front door of the relay.
//!
//! Listens on `0.0.0.0:8080` by default (see [`RelayServer::with_port`]).
//!
//! * WebSocket upgrades → a connection fed into the shared [`Router`].
//! * Anything else → the static pages and login check in [`Site`].

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use teleop_core::Router;
use teleop_types::RelayError;
use tokio::net::TcpListener;
use tracing::info;

use crate::auth::CredentialStore;
use crate::http::{self, Site};

/// Default TCP port for both HTTP and WebSocket traffic.
pub const DEFAULT_PORT: u16 = 8080;

/// Default directory the operator pages are served from.
pub const DEFAULT_WEB_ROOT: &str = "web";

// ---------------------------------------------------------------------------
// RelayServer
// ---------------------------------------------------------------------------

/// Accepts vehicles and browsers on one port and plugs them into a
/// [`Router`].
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use teleop_core::Router;
/// use teleop_server::RelayServer;
///
/// #[tokio::main]
/// async fn main() {
///     let router = Arc::new(Router::default());
///     RelayServer::new(router)
///         .with_port(8080)
///         .run()
///         .await
///         .expect("relay server failed");
/// }
/// ```
pub struct RelayServer {
    router: Arc<Router>,
    site: Site,
    bind_address: IpAddr,
    port: u16,
}

impl RelayServer {
    /// Create a server for `router` on `0.0.0.0:`[`DEFAULT_PORT`], serving
    /// pages from [`DEFAULT_WEB_ROOT`] with no login accounts.
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            site: Site::new(DEFAULT_WEB_ROOT, CredentialStore::new()),
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the listening address (builder-style).
    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Replace the static-page directory and login accounts.
    pub fn with_site(mut self, site: Site) -> Self {
        self.site = site;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Bind and serve forever.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] if the TCP listener cannot bind.
    pub async fn run(self) -> Result<(), RelayError> {
        self.run_until(std::future::pending()).await
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), RelayError> {
        let addr = self.local_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RelayError::Transport(format!("bind error on {addr}: {e}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound `listener` until `shutdown` resolves.
    ///
    /// Upgraded WebSocket connections keep running on their own tasks after
    /// shutdown; plain HTTP requests in flight are allowed to finish.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), RelayError> {
        let local = listener
            .local_addr()
            .map_err(|e| RelayError::Transport(format!("listener address: {e}")))?;
        info!(addr = %local, web_root = %self.site.web_root().display(), "relay listening");

        let app = http::app(self.router, self.site);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("shutdown requested; no longer accepting connections");
            })
            .await
            .map_err(|e| RelayError::Transport(format!("server error: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! `teleop-server` – Transport adapter for the teleop relay
//!
//! Boots a single-port `axum` server (default port `8080`) that:
//!
//! 1. **Relays** – every WebSocket connection becomes a
//!    [`Connection`][teleop_core::Connection] on the shared
//!    [`Router`][teleop_core::Router].  JSON frames are decoded into
//!    [`InboundMessage`][teleop_types::InboundMessage]s (anything else is
//!    logged and dropped) and the router's replies are written back as JSON.
//!
//! 2. **Serves** the operator pages (login, car list, controller) from a web
//!    root directory.
//!
//! 3. **Checks logins** – `POST /login` against a [`CredentialStore`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use teleop_core::Router;
//! use teleop_server::{CredentialStore, RelayServer, Site};
//!
//! #[tokio::main]
//! async fn main() {
//!     let credentials = CredentialStore::from_pairs([("pilot", "secret")]);
//!     RelayServer::new(Arc::new(Router::default()))
//!         .with_site(Site::new("web", credentials))
//!         .run()
//!         .await
//!         .expect("relay server failed");
//! }
//! ```

pub mod auth;
pub mod http;
pub mod server;
mod ws;

pub use auth::CredentialStore;
pub use http::Site;
pub use server::{DEFAULT_PORT, DEFAULT_WEB_ROOT, RelayServer};

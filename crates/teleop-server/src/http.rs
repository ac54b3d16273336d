//! HTTP side of the relay port, built on `axum`.
//!
//! | Request | Handler |
//! |---|---|
//! | `POST /login` | `login`, checked against the [`CredentialStore`] |
//! | WebSocket upgrade on any other path | the relay socket loop |
//! | anything else | static pages below the web root via `ServeDir` |
//!
//! `CorsLayer` adds `Access-Control-Allow-Origin: *` everywhere; preflight
//! `OPTIONS` requests answer 204.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Json,
    body::{Body, Bytes},
    extract::{
        DefaultBodyLimit, Request, State,
        ws::{WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use teleop_core::Router;
use tower::ServiceExt;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::{debug, info, warn};

use crate::auth::CredentialStore;

/// Largest accepted request body.
pub(crate) const MAX_BODY_BYTES: usize = 64 * 1024;

const NOT_FOUND_PAGE: &str = "<html>\n  <body>\n    <h1>404 - Page not found</h1>\n    \
<p>The requested page does not exist.</p>\n    <a href=\"/\">Back to start</a>\n  </body>\n</html>\n";

// ---------------------------------------------------------------------------
// Site
// ---------------------------------------------------------------------------

/// Everything the HTTP side needs: where the pages live and who may log in.
#[derive(Debug, Clone)]
pub struct Site {
    web_root: PathBuf,
    pages: ServeDir,
    credentials: CredentialStore,
}

impl Site {
    pub fn new(web_root: impl Into<PathBuf>, credentials: CredentialStore) -> Self {
        let web_root = web_root.into();
        Self {
            pages: ServeDir::new(&web_root),
            web_root,
            credentials,
        }
    }

    pub fn web_root(&self) -> &Path {
        &self.web_root
    }
}

#[derive(Clone)]
struct AppState {
    router: Arc<Router>,
    site: Arc<Site>,
}

/// The full HTTP + WebSocket application for one relay.
pub(crate) fn app(router: Arc<Router>, site: Site) -> axum::Router {
    let state = AppState {
        router,
        site: Arc::new(site),
    };

    axum::Router::new()
        .route("/login", post(login))
        .fallback(upgrade_or_page)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(middleware::from_fn(preflight_no_content))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    success: bool,
    message: &'static str,
}

async fn login(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match serde_json::from_slice::<LoginRequest>(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "unparsable login body");
            return login_reply(StatusCode::BAD_REQUEST, false, "Invalid data");
        }
    };

    if state.site.credentials.verify(&request.username, &request.password) {
        info!(username = %request.username, "login succeeded");
        login_reply(StatusCode::OK, true, "Login successful")
    } else {
        warn!(username = %request.username, "login rejected");
        login_reply(StatusCode::UNAUTHORIZED, false, "Invalid username or password")
    }
}

fn login_reply(status: StatusCode, success: bool, message: &'static str) -> Response {
    (status, Json(LoginResponse { success, message })).into_response()
}

/// WebSocket upgrades go to the relay whatever the path; plain requests get
/// the static pages.
async fn upgrade_or_page(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    request: Request,
) -> Response {
    match upgrade {
        Ok(ws) => {
            let router = Arc::clone(&state.router);
            ws.on_upgrade(move |socket| crate::ws::relay_socket(socket, router))
        }
        Err(_) if request.method() == Method::OPTIONS => StatusCode::NO_CONTENT.into_response(),
        Err(_) => serve_page(&state.site, request).await,
    }
}

async fn serve_page(site: &Site, request: Request) -> Response {
    let path = request.uri().path().to_owned();
    let response = match site.pages.clone().oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    match response.status() {
        StatusCode::OK => {
            let mut response = response.map(Body::new);
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(content_type_for(&path)),
            );
            response
        }
        StatusCode::NOT_FOUND => {
            debug!(path, "page not found");
            (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response()
        }
        _ => response.map(Body::new),
    }
}

/// Preflight answers carry no body, so report them as 204.
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_options = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_options && response.status().is_success() {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

/// Content type by extension; `/` and directories resolve to `index.html`.
fn content_type_for(path: &str) -> &'static str {
    if path.ends_with('/') {
        return "text/html";
    }
    match Path::new(path).extension().and_then(OsStr::to_str) {
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "text/html",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

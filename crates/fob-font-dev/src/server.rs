//! Standalone dev server for fonts and the font manifest module.

use crate::SharedSession;
use crate::error::{DevError, Result};
use crate::middleware::{font_asset_layer, serve_font_asset};
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};

/// Route serving the runtime manifest module.
pub const MANIFEST_ROUTE: &str = "/@fob-font/manifest.js";

/// Serves emitted fonts and the manifest module of a session.
pub struct DevFontServer {
    session: SharedSession,
    addr: SocketAddr,
}

impl DevFontServer {
    pub fn new(session: SharedSession, addr: SocketAddr) -> Self {
        Self { session, addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Build the axum router.
    ///
    /// Every path that is not the manifest module is looked up in the font
    /// store. CORS is open so a page served from another dev origin can load
    /// the fonts.
    pub fn router(&self) -> Router {
        Router::new()
            .route(MANIFEST_ROUTE, get(handle_manifest))
            .fallback(serve_font_asset)
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(self.session.clone())
    }

    /// Bind and serve until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns error if server cannot bind to configured address
    pub async fn start(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| DevError::Server(format!("Failed to bind to {}: {}", self.addr, e)))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: tokio::net::TcpListener) -> Result<()> {
        let addr = listener
            .local_addr()
            .map_err(|e| DevError::Server(e.to_string()))?;
        tracing::info!("Font dev server running at http://{}", addr);

        axum::serve(listener, self.router())
            .await
            .map_err(|e| DevError::Server(format!("Server error: {}", e)))
    }
}

/// Put font serving in front of an existing dev server router.
pub fn with_font_assets<S>(router: Router<S>, session: SharedSession) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(session, font_asset_layer))
}

async fn handle_manifest(State(session): State<SharedSession>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        session.manifest_module(),
    )
        .into_response()
}

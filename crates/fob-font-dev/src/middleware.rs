//! Serves emitted font files from memory during development.
//!
//! Fonts never touch the disk in dev mode. The loaders write them into the
//! session's [`FontAssetStore`](fob_font::FontAssetStore) and these handlers
//! answer requests for their public URLs.

use crate::SharedSession;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{StatusCode, Uri, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use fob_font::StoredFont;
use fob_font::manifest::url_origin;

/// Look up the font stored under a request path.
///
/// Stored URLs carry the configured base path. When that base path is an
/// absolute URL the request only sees its path, so the origin is put back
/// before the second lookup.
pub fn find_font(session: &SharedSession, path: &str) -> Option<StoredFont> {
    let store = session.store();
    store.get(path).or_else(|| {
        let origin = url_origin(session.urls().base_path())?;
        store.get(&format!("{origin}{path}"))
    })
}

/// Handler answering font requests, 404 for anything else.
pub async fn serve_font_asset(
    State(session): State<SharedSession>,
    uri: Uri,
) -> Result<Response, Response> {
    let font = find_font(&session, uri.path()).ok_or_else(|| not_found(uri.path()))?;
    tracing::debug!("Serving font {} for {}", font.file_name, uri.path());
    Ok(font_response(font))
}

/// Middleware answering font requests and passing everything else through.
pub async fn font_asset_layer(
    State(session): State<SharedSession>,
    request: Request,
    next: Next,
) -> Response {
    match find_font(&session, request.uri().path()) {
        Some(font) => font_response(font),
        None => next.run(request).await,
    }
}

fn font_response(font: StoredFont) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, font.content_type),
            // Dev mode: always fresh
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from(font.content.to_vec()),
    )
        .into_response()
}

fn not_found(path: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain")],
        format!("Font not found: {path}"),
    )
        .into_response()
}

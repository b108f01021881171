//! HTTP server over the post cache

use anyhow::Result;
use axum::{
    extract::{Path as UrlPath, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::cache::{Artifact, PostCache};
use crate::templates;
use crate::Site;

/// Server state
pub struct ServerState {
    cache: Arc<PostCache>,
    title: String,
    /// Route prefix of the posts, `/reflections` or empty
    posts_path: String,
}

impl ServerState {
    pub fn new(site: &Site, cache: Arc<PostCache>) -> Self {
        Self {
            cache,
            title: site.config.title.clone(),
            posts_path: site.config.posts_path(),
        }
    }
}

/// Build the application router
pub fn router(state: Arc<ServerState>, static_dir: &Path) -> Router {
    let base = state.posts_path.clone();

    let mut app = Router::new().route("/", get(index_handler));
    if !base.is_empty() {
        app = app.route(&base, get(index_handler));
    }

    app.route(&format!("{}/feed.rss", base), get(feed_handler))
        .route(&format!("{}/:slug", base), get(post_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server and run until Ctrl+C
pub async fn start(site: &Site, cache: Arc<PostCache>, ip: &str, port: u16) -> Result<()> {
    let state = Arc::new(ServerState::new(site, cache));
    let app = router(state, &site.static_dir);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server running at http://{}:{}", ip, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn index_handler(State(state): State<Arc<ServerState>>) -> Html<String> {
    Html(templates::index_page(
        &state.title,
        &state.posts_path,
        state.cache.all_posts(),
    ))
}

async fn post_handler(
    State(state): State<Arc<ServerState>>,
    UrlPath(slug): UrlPath<String>,
    headers: HeaderMap,
) -> Response {
    match state.cache.post_by_identifier(&slug) {
        Some(cached) => serve_artifact(&cached.page, headers.get(header::ACCEPT_ENCODING)),
        None => (StatusCode::NOT_FOUND, "Post not found").into_response(),
    }
}

async fn feed_handler(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    match state.cache.feed() {
        Some(feed) => serve_artifact(feed, headers.get(header::ACCEPT_ENCODING)),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "RSS feed not available").into_response(),
    }
}

/// Respond with the compressed payload when the client accepts brotli and
/// one exists, otherwise with the raw bytes
pub fn serve_artifact(artifact: &Artifact, accept_encoding: Option<&HeaderValue>) -> Response {
    let wants_br = accept_encoding
        .and_then(|v| v.to_str().ok())
        .map(accepts_brotli)
        .unwrap_or(false);

    match artifact.compressed_bytes() {
        Some(compressed) if wants_br => (
            [
                (header::CONTENT_TYPE, artifact.content_type()),
                (header::CONTENT_ENCODING, "br"),
                (header::VARY, "Accept-Encoding"),
            ],
            compressed.clone(),
        )
            .into_response(),
        _ => (
            [(header::CONTENT_TYPE, artifact.content_type())],
            artifact.raw_bytes().clone(),
        )
            .into_response(),
    }
}

/// Whether an `Accept-Encoding` value allows brotli.
///
/// An explicit `br` entry wins over `*`; a q-value of zero refuses.
pub fn accepts_brotli(accept_encoding: &str) -> bool {
    let mut br = None;
    let mut any = None;

    for entry in accept_encoding.split(',') {
        let mut parts = entry.split(';');
        let coding = parts.next().unwrap_or("").trim();
        let q = parts
            .filter_map(|p| p.trim().strip_prefix("q=").or_else(|| p.trim().strip_prefix("Q=")))
            .find_map(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);

        if coding.eq_ignore_ascii_case("br") {
            br = Some(q);
        } else if coding == "*" {
            any = Some(q);
        }
    }

    br.or(any).map(|q| q > 0.0).unwrap_or(false)
}

//! HTTP handlers
//!
//! Every path not claimed by a web control is looked up in the routing
//! table and, when the client is allowed, answered with a streaming body
//! fed by a spawned relay task.

use crate::access::can_access;
use crate::config::{RoutingStore, SourceDescriptor};
use crate::error::RelayError;
use crate::helper::{MULTICAST_CONTENT_TYPE, RESPONSE_CHANNEL_CAPACITY};
use crate::relay::{ChannelSink, Relay, Session};
use crate::stats::{StatsHandle, StreamGuard};
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// State shared by all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    /// Active routing table holder
    pub routes: Arc<RoutingStore>,
    /// Stream counters
    pub stats: StatsHandle,
    /// Session opener
    pub relay: Relay,
    /// Content served to clients outside every permitted network
    pub fake_stream: Option<Arc<PathBuf>>,
    /// Server start time
    pub started: Instant,
}

/// Body of `/server-status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Streams currently running
    pub running_streams: u64,
    /// Streams started since startup
    pub total_streams: u64,
    /// Highest concurrent stream count
    pub peak_streams: u64,
    /// Routes in the active table
    pub routes: usize,
    /// Seconds since startup
    pub uptime_secs: u64,
}

/// Relay a routed source to the client
pub async fn stream_source(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
) -> Response {
    if method != Method::GET {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
    }

    let path = uri.path();
    info!(client = %peer, path = %path, "Connection");

    let table = state.routes.snapshot();
    let Some(descriptor) = table.lookup(path) else {
        info!(path = %path, "Source not found");
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };

    if !can_access(&descriptor, &peer.to_string()) {
        info!(client = %peer, path = %path, "Access denied");
        return denied(&state).await;
    }

    let session = match state.relay.open(&descriptor, table.buffer_size()).await {
        Ok(session) => session,
        Err(RelayError::Upstream { url, reason }) => {
            warn!(path = %path, "Upstream {} unavailable: {}", url, reason);
            return (StatusCode::NOT_FOUND, "Not found").into_response();
        }
        Err(e) => {
            warn!(path = %path, "{}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Could not get stream source")
                .into_response();
        }
    };

    let content_type = session.content_type();
    let (sink, body) = ChannelSink::channel(RESPONSE_CHANNEL_CAPACITY);
    let guard = state.stats.session().await;
    tokio::spawn(run_session(session, sink, guard, descriptor, peer));

    streaming_response(&content_type, Body::from_stream(body))
}

async fn run_session(
    session: Session,
    mut sink: ChannelSink,
    guard: StreamGuard,
    descriptor: Arc<SourceDescriptor>,
    peer: SocketAddr,
) {
    info!(client = %peer, path = %descriptor.path, "Serving {}", descriptor.kind);

    match session.run(&mut sink).await {
        Ok(end) => debug!(client = %peer, path = %descriptor.path, "Stream ended: {:?}", end),
        Err(e) => {
            warn!(client = %peer, path = %descriptor.path, "{}", e);
            sink.abort(io::Error::new(io::ErrorKind::Other, e.to_string()))
                .await;
        }
    }

    guard.finish().await;
    info!(client = %peer, path = %descriptor.path, "Client closed");
}

async fn denied(state: &AppState) -> Response {
    let Some(path) = state.fake_stream.as_deref() else {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    };

    match tokio::fs::File::open(path).await {
        Ok(file) => streaming_response(
            MULTICAST_CONTENT_TYPE,
            Body::from_stream(ReaderStream::new(file)),
        ),
        Err(e) => {
            warn!("Cannot open fake stream {:?}: {}", path, e);
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
    }
}

fn streaming_response(content_type: &str, body: Body) -> Response {
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body);

    match response {
        Ok(response) => response,
        Err(e) => {
            warn!("Cannot build response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Report stream counters and table size
pub async fn server_status(State(state): State<AppState>) -> Json<StatusReport> {
    let stats = state.stats.snapshot();
    Json(StatusReport {
        running_streams: stats.running_streams,
        total_streams: stats.total_streams,
        peak_streams: stats.peak_streams,
        routes: state.routes.snapshot().len(),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

/// Re-read the configuration files
pub async fn reload_config(State(state): State<AppState>) -> Response {
    let routes = state.routes.clone();
    match tokio::task::spawn_blocking(move || routes.reload()).await {
        Ok(Ok(_)) => (StatusCode::OK, "Config reloaded").into_response(),
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Config not loaded: {}", e),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Reload failed: {}", e),
        )
            .into_response(),
    }
}

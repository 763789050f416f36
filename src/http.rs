//! HTTP server for the Prometheus metrics endpoint.
//!
//! Runs on a separate tokio task and serves:
//! - `/metrics` for Prometheus scraping
//! - `/channels` with a JSON listing of the registry

use crate::state::{ChannelRecord, LifecycleHandle};
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use std::net::SocketAddr;

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

#[derive(Debug, Serialize)]
struct ChannelView {
    owner: String,
    primary: String,
    secondary: Option<String>,
    created_at: i64,
    expires_at: i64,
    last_active_at: i64,
    notice_sent: bool,
    pending_delete: bool,
}

impl From<&ChannelRecord> for ChannelView {
    fn from(record: &ChannelRecord) -> Self {
        Self {
            owner: record.owner.to_string(),
            primary: record.primary.to_string(),
            secondary: record.secondary.map(|c| c.to_string()),
            created_at: record.created_at.timestamp(),
            expires_at: record.expires_at.timestamp(),
            last_active_at: record.last_active_at.timestamp(),
            notice_sent: record.notice_sent,
            pending_delete: record.is_pending_delete(),
        }
    }
}

/// Handler for GET /channels.
async fn channels_handler(
    State(handle): State<LifecycleHandle>,
) -> Result<Json<Vec<ChannelView>>, StatusCode> {
    let mut records = handle
        .snapshot()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    records.sort_by_key(|r| r.expires_at);
    Ok(Json(records.iter().map(ChannelView::from).collect()))
}

pub fn router(handle: LifecycleHandle) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/channels", get(channels_handler))
        .with_state(handle)
}

/// Run the HTTP server.
///
/// Binds to `0.0.0.0:port`. This is a long-running task that should be
/// spawned in the background.
pub async fn run_http_server(port: u16, handle: LifecycleHandle) {
    let app = router(handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "HTTP server listening");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind HTTP server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "HTTP server error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{ChannelRef, UserId};
    use chrono::DateTime;

    #[test]
    fn channel_view_uses_string_ids() {
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let record = ChannelRecord::new(UserId(1), ChannelRef(10), Some(ChannelRef(11)), t0, t0);
        let json = serde_json::to_value(ChannelView::from(&record)).unwrap();

        assert_eq!(json["owner"], "1");
        assert_eq!(json["secondary"], "11");
        assert_eq!(json["pending_delete"], false);
    }
}

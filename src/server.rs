//! ==============================================================================
//! server.rs - json status surface
//! ==============================================================================
//!
//! purpose:
//!     small axum server exposing the hub's shared state for diagnostics:
//!     `/health` for probes, `/api/status` for a full snapshot. read-only;
//!     the session is controlled by the physical button, not over http.
//!
//! relationships:
//!     - spawned by: main.rs (when [server].enabled)
//!     - reads: state.rs via the shared lock, one acquisition per request
//!
//! ==============================================================================

use std::time::Instant;

use anyhow::Result;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::tasks::SharedState;

#[derive(Serialize)]
struct PeerStatus {
    id: String,
    value: i64,
    age_secs: u64,
}

#[derive(Serialize)]
struct StatusSnapshot {
    active: bool,
    degraded: bool,
    indicator: crate::state::Indicator,
    peer_count: usize,
    peers: Vec<PeerStatus>,
    average: Option<f64>,
    /// seconds since any message was received (diagnostic, not liveness)
    last_message_age_secs: Option<u64>,
}

pub async fn run_server(state: SharedState, port: u16) -> Result<()> {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/status", get(status_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "status server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn status_handler(State(state): State<SharedState>) -> Json<StatusSnapshot> {
    let now = Instant::now();
    let s = state.lock().await;
    let mut peers: Vec<PeerStatus> = s
        .peers
        .iter()
        .map(|(id, r)| PeerStatus {
            id: id.clone(),
            value: r.value,
            age_secs: now.duration_since(r.last_seen).as_secs(),
        })
        .collect();
    peers.sort_by(|a, b| a.id.cmp(&b.id));

    Json(StatusSnapshot {
        active: s.active,
        degraded: s.degraded,
        indicator: s.indicator,
        peer_count: peers.len(),
        peers,
        average: s.live_average(),
        last_message_age_secs: s.last_message.map(|t| now.duration_since(t).as_secs()),
    })
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{HubState, Thresholds};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn snapshot_reflects_state() {
        let state: SharedState = Arc::new(Mutex::new(HubState::new()));
        {
            let mut s = state.lock().await;
            let now = Instant::now();
            s.start_session(now);
            s.ingest("10.0.0.1", 300, now, &Thresholds { low: 400, high: 700 });
            s.ingest("10.0.0.2", 500, now, &Thresholds { low: 400, high: 700 });
        }

        let Json(snapshot) = status_handler(State(state)).await;
        assert!(snapshot.active);
        assert_eq!(snapshot.peer_count, 2);
        assert_eq!(snapshot.average, Some(400.0));
        assert_eq!(snapshot.peers[0].id, "10.0.0.1");
        assert_eq!(snapshot.peers[0].value, 300);
        assert_eq!(snapshot.last_message_age_secs, Some(0));
    }
}

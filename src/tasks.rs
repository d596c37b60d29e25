//! ==============================================================================
//! tasks.rs - long-lived concurrent activities
//! ==============================================================================
//!
//! purpose:
//!     the four activities the hub runs for its whole lifetime: datagram
//!     ingest, periodic liveness sweep, diagnostic blink and the button edge
//!     monitor. they communicate only through the shared HubState; each
//!     read-modify-write sequence takes the lock exactly once and releases it
//!     before any socket send.
//!
//! relationships:
//!     - spawned by: main.rs
//!     - uses: state.rs (core), net.rs (socket), panel.rs (leds), hal.rs (button)
//!
//! ==============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::hal::HardwareProvider;
use crate::net::{parse_reading, Datagrams, HubSocket};
use crate::panel::IndicatorPanel;
use crate::state::{HubState, Indicator, Thresholds};

pub type SharedState = Arc<Mutex<HubState>>;

/// how often the button line is sampled. fast enough that a human press is
/// never missed, well below the re-arm delay.
const BUTTON_POLL: Duration = Duration::from_millis(25);

/// engine parameters lifted out of the config once at startup
#[derive(Debug, Clone, Copy)]
pub struct EngineParams {
    pub thresholds: Thresholds,
    pub expected_peers: usize,
    pub peer_timeout: Duration,
}

// ==============================================================================
// session toggle
// ==============================================================================

/// flip the session state. stop broadcasts "Reset" and blanks the panel;
/// start broadcasts "Start" and arms it. the state flip happens under the
/// lock, the broadcast after release.
pub async fn toggle_session(
    state: &SharedState,
    socket: &HubSocket,
    panel: &IndicatorPanel,
) -> Result<()> {
    let now_active = {
        let mut s = state.lock().await;
        if s.active {
            s.stop_session();
        } else {
            s.start_session(std::time::Instant::now());
        }
        s.active
    };

    if now_active {
        tracing::info!("starting data collection");
        socket.send_start().await?;
        panel.apply(Indicator::Armed)?;
        panel.set_diag(true)?;
    } else {
        tracing::info!("stopping data collection");
        socket.send_reset().await?;
        panel.all_off()?;
    }
    Ok(())
}

// ==============================================================================
// ingest
// ==============================================================================

/// pause after a failed receive so a persistently broken socket logs a
/// steady diagnostic instead of spinning a core
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(250);

/// foreground activity: park on the socket, feed readings into the table.
/// malformed payloads are discarded with a notice; receive errors are logged
/// and the loop keeps going - nothing mid-run is fatal.
pub async fn run_ingest<S: Datagrams>(
    socket: Arc<S>,
    state: SharedState,
    panel: Arc<IndicatorPanel>,
    params: EngineParams,
) {
    let mut buf = [0u8; 1024];
    loop {
        let (len, addr) = match socket.recv_dgram(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                tracing::warn!(error = %e, "receive failed, backing off");
                tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                continue;
            }
        };
        let peer = addr.ip().to_string();

        let Some(value) = parse_reading(&buf[..len]) else {
            tracing::debug!(%peer, "discarding malformed payload");
            continue;
        };

        let (accepted, indicator, live) = {
            let mut s = state.lock().await;
            let accepted = s.ingest(&peer, value, std::time::Instant::now(), &params.thresholds);
            (accepted, s.indicator, s.peers.len())
        };
        if !accepted {
            continue;
        }

        tracing::debug!(%peer, value, live, "reading ingested");
        if live > params.expected_peers {
            tracing::debug!(live, expected = params.expected_peers, "more peers than expected");
        }
        if let Err(e) = panel.apply(indicator) {
            tracing::warn!(error = %e, "panel write failed");
        }
    }
}

// ==============================================================================
// liveness sweeper
// ==============================================================================

/// periodic sweep: evict peers silent past the timeout (only from a full
/// table), re-query each evicted peer, maintain the degraded flag. the
/// below-capacity warning fires on the edge, not every tick.
pub async fn run_sweeper(
    state: SharedState,
    socket: Arc<HubSocket>,
    panel: Arc<IndicatorPanel>,
    params: EngineParams,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;

        let (outcome, indicator, live) = {
            let mut s = state.lock().await;
            let outcome = s.sweep(
                std::time::Instant::now(),
                params.peer_timeout,
                params.expected_peers,
                &params.thresholds,
            );
            (outcome, s.indicator, s.peers.len())
        };

        if outcome.degraded_edge {
            tracing::warn!(
                live,
                expected = params.expected_peers,
                "below capacity: fewer peers connected than expected"
            );
        }

        if outcome.requery.is_empty() {
            continue;
        }
        for peer in &outcome.requery {
            tracing::info!(%peer, "re-querying silent peer");
            if let Err(e) = socket.send_query(peer).await {
                tracing::warn!(%peer, error = %e, "re-query send failed");
            }
        }
        // eviction changed the average
        if let Err(e) = panel.apply(indicator) {
            tracing::warn!(error = %e, "panel write failed");
        }
    }
}

// ==============================================================================
// diagnostic blinker
// ==============================================================================

/// drives the white line: blinks while degraded, otherwise parks it at the
/// session level (solid while armed, dark when idle).
pub async fn run_blinker(state: SharedState, panel: Arc<IndicatorPanel>, half_period: Duration) {
    let mut phase = false;
    let mut ticker = tokio::time::interval(half_period);
    loop {
        ticker.tick().await;
        let (degraded, active) = {
            let s = state.lock().await;
            (s.degraded, s.active)
        };
        let level = if degraded {
            phase = !phase;
            phase
        } else {
            phase = false;
            active
        };
        if let Err(e) = panel.set_diag(level) {
            tracing::warn!(error = %e, "diag led write failed");
        }
    }
}

// ==============================================================================
// button edge monitor
// ==============================================================================

/// samples the button line and fires the toggle on a rising edge, at most
/// once per re-arm interval regardless of how long the press is held.
pub async fn run_button(
    hal: Arc<dyn HardwareProvider>,
    pin: u8,
    rearm: Duration,
    state: SharedState,
    socket: Arc<HubSocket>,
    panel: Arc<IndicatorPanel>,
) {
    let mut prev = false;
    let mut last_toggle: Option<tokio::time::Instant> = None;
    let mut ticker = tokio::time::interval(BUTTON_POLL);
    loop {
        ticker.tick().await;
        let level = match hal.read_input(pin) {
            Ok(level) => level,
            Err(e) => {
                tracing::warn!(error = %e, "button read failed");
                continue;
            }
        };
        let rising = level && !prev;
        prev = level;
        if !rising {
            continue;
        }
        if let Some(t) = last_toggle {
            if t.elapsed() < rearm {
                continue;
            }
        }
        last_toggle = Some(tokio::time::Instant::now());
        if let Err(e) = toggle_session(&state, &socket, &panel).await {
            tracing::warn!(error = %e, "session toggle failed");
        }
    }
}

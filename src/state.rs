//! ==============================================================================
//! state.rs - peer table, session state and indicator derivation
//! ==============================================================================
//!
//! purpose:
//!     the aggregation core. tracks every sensor node that has reported during
//!     the current session, derives per-peer liveness, computes the running
//!     average and maps it onto an indicator code.
//!
//! relationships:
//!     - mutated by: tasks.rs (ingest, sweep, toggle) under one lock per operation
//!     - read by: server.rs (status snapshot)
//!     - knows nothing about sockets or pins; the clock is passed in as Instant
//!
//! ==============================================================================

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

/// what the colour panel should currently show.
///
/// Off/Armed come from the session controller, Low/Mid/High from the
/// aggregator. the degraded blink overlay is a separate flag, not a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Indicator {
    Off,
    Armed,
    Low,
    Mid,
    High,
}

/// latest report from one sensor node
#[derive(Debug, Clone)]
pub struct PeerRecord {
    /// last reported integer reading
    pub value: i64,
    /// receipt time of that reading
    pub last_seen: Instant,
}

/// threshold band boundaries for the average → indicator mapping
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub low: i64,
    pub high: i64,
}

/// pure mapping from a (truncated) average to an indicator code.
/// idempotent by construction - no hidden state.
pub fn map_threshold(avg: i64, thresholds: &Thresholds) -> Indicator {
    if avg > thresholds.high {
        Indicator::High
    } else if avg < thresholds.low {
        Indicator::Low
    } else {
        Indicator::Mid
    }
}

/// what one liveness sweep decided
#[derive(Debug, Default)]
pub struct SweepOutcome {
    /// peers evicted this sweep that should receive a directed re-query
    pub requery: Vec<String>,
    /// true exactly when degraded went false -> true this sweep
    pub degraded_edge: bool,
}

// ==============================================================================
// shared hub state
// ==============================================================================
// one instance lives behind Arc<tokio::sync::Mutex<_>> and is the only thing
// the concurrent activities communicate through. every read-modify-write
// sequence happens under a single lock acquisition; the lock is never held
// across a socket send or receive.

pub struct HubState {
    /// collection session running?
    pub active: bool,
    /// fewer live peers than expected while a session is active
    pub degraded: bool,
    /// current panel state
    pub indicator: Indicator,
    /// peer id (source ip string) -> latest record
    pub peers: HashMap<String, PeerRecord>,
    /// receipt time of the last message from anyone. diagnostic only;
    /// liveness decisions are per-peer.
    pub last_message: Option<Instant>,
}

impl Default for HubState {
    fn default() -> Self {
        Self::new()
    }
}

impl HubState {
    pub fn new() -> Self {
        Self {
            active: false,
            degraded: false,
            indicator: Indicator::Off,
            peers: HashMap::new(),
            last_message: None,
        }
    }

    /// begin a collection session: fresh reference timestamp, panel armed.
    pub fn start_session(&mut self, now: Instant) {
        self.active = true;
        self.indicator = Indicator::Armed;
        self.last_message = Some(now);
    }

    /// end the session and drop everything derived from it, atomically
    /// (caller holds the lock for the whole call).
    pub fn stop_session(&mut self) {
        self.active = false;
        self.degraded = false;
        self.indicator = Indicator::Off;
        self.peers.clear();
        self.last_message = None;
    }

    /// record a reading from `peer`. returns true when the reading was taken
    /// into the table (i.e. a session is active) so the caller knows whether
    /// the panel may have changed.
    pub fn ingest(&mut self, peer: &str, value: i64, now: Instant, thresholds: &Thresholds) -> bool {
        if !self.active {
            tracing::debug!(%peer, value, "reading received while idle, ignoring");
            return false;
        }
        self.peers.insert(
            peer.to_string(),
            PeerRecord { value, last_seen: now },
        );
        self.last_message = Some(now);
        self.recompute(thresholds);
        true
    }

    /// arithmetic mean over the currently live peer set, None when empty.
    /// accumulated in i128: readings are unauthenticated, so a pair of
    /// i64::MAX values must produce a large average, not an overflow.
    pub fn live_average(&self) -> Option<f64> {
        if self.peers.is_empty() {
            return None;
        }
        let sum: i128 = self.peers.values().map(|r| r.value as i128).sum();
        Some(sum as f64 / self.peers.len() as f64)
    }

    /// re-derive the indicator from the current average. an empty table
    /// leaves the previous indicator untouched.
    pub fn recompute(&mut self, thresholds: &Thresholds) {
        if let Some(avg) = self.live_average() {
            // truncate toward zero before comparing, matching the integer
            // readings the nodes send
            self.indicator = map_threshold(avg as i64, thresholds);
        }
    }

    /// one liveness sweep. evicts and flags for re-query only when the table
    /// was at full capacity before the sweep: re-querying is meaningless for
    /// peers that never joined. recomputes after any eviction so the average
    /// never includes an evicted peer.
    pub fn sweep(
        &mut self,
        now: Instant,
        timeout: Duration,
        expected: usize,
        thresholds: &Thresholds,
    ) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        if !self.active {
            return outcome;
        }

        let pre_count = self.peers.len();
        let mut stale: Vec<String> = self
            .peers
            .iter()
            .filter(|(_, r)| now.duration_since(r.last_seen) > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        if pre_count == expected && !stale.is_empty() {
            stale.sort(); // deterministic query order
            for id in &stale {
                self.peers.remove(id);
                tracing::info!(peer = %id, "peer silent past timeout, evicting");
            }
            self.recompute(thresholds);
            outcome.requery = stale;
        }

        let below = self.peers.len() < expected;
        outcome.degraded_edge = below && !self.degraded;
        self.degraded = below;
        outcome
    }
}

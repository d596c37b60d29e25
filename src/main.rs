//! ==============================================================================
//! main.rs - sensor hub entry point
//! ==============================================================================
//!
//! purpose:
//!     control-box front-end for a small fleet of udp sensor nodes. the nodes
//!     broadcast integer readings; this hub tracks per-node liveness, keeps a
//!     running average and drives an led panel. a physical button starts and
//!     stops the collection session.
//!
//! responsibilities:
//!     - load configuration (config/hub.toml)
//!     - bind the broadcast udp socket (the one fatal startup path)
//!     - construct the hal, panel and shared state
//!     - spawn the long-lived activities: sweeper, blinker, button monitor,
//!       status server
//!     - run the datagram ingest loop in the foreground
//!
//! architecture:
//!
//!     button ──edge──▶ toggle ─────┐
//!     udp in ──────▶ ingest ───────┤
//!     1s tick ─────▶ sweeper ──────┼──▶ HubState (one lock per operation)
//!     0.25s tick ──▶ blinker ──────┤          │
//!     http ────────▶ status api ───┘          ▼
//!                                        led panel / re-query broadcasts
//!
//! ==============================================================================

mod config;
mod hal;
mod net;
mod panel;
mod server;
mod state;
mod tasks;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::panel::{IndicatorPanel, PanelPins};
use crate::state::{HubState, Thresholds};
use crate::tasks::EngineParams;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_source) = config::HubConfig::load_or_default();

    // tracing: RUST_LOG wins, otherwise the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting sensor hub");
    config.log_summary(config_source.as_deref());

    // shared state, hal, panel
    let state = Arc::new(Mutex::new(HubState::new()));
    let hal = hal::default_hal()?;
    let panel = Arc::new(IndicatorPanel::new(
        hal.clone(),
        PanelPins {
            red: config.pins.red,
            yellow: config.pins.yellow,
            green: config.pins.green,
            white: config.pins.white,
        },
    ));
    panel.all_off()?;

    // the broadcast socket; bind failure here terminates the process
    let socket = Arc::new(
        net::HubSocket::bind(&config.network.broadcast_addr, config.network.port).await?,
    );
    tracing::info!(
        port = config.network.port,
        broadcast = %config.network.broadcast_addr,
        "udp socket ready"
    );

    let params = EngineParams {
        thresholds: Thresholds {
            low: config.thresholds.low,
            high: config.thresholds.high,
        },
        expected_peers: config.peers.expected_count,
        peer_timeout: config.peers.timeout(),
    };

    // background activities
    tokio::spawn(tasks::run_sweeper(
        state.clone(),
        socket.clone(),
        panel.clone(),
        params,
        config.timing.sweep_period(),
    ));
    tokio::spawn(tasks::run_blinker(
        state.clone(),
        panel.clone(),
        config.timing.blink_half_period(),
    ));
    tokio::spawn(tasks::run_button(
        hal,
        config.pins.button,
        config.timing.button_rearm(),
        state.clone(),
        socket.clone(),
        panel.clone(),
    ));
    if config.server.enabled {
        let server_state = state.clone();
        let port = config.server.port;
        tokio::spawn(async move {
            if let Err(e) = server::run_server(server_state, port).await {
                tracing::error!(error = %e, "status server failed");
            }
        });
    }

    // foreground: park on the socket and feed the table
    tasks::run_ingest(socket, state, panel, params).await;
    Ok(())
}
